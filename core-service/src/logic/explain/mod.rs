//! Explain Module - Per-feature local attribution
//!
//! Best effort: whatever goes wrong here degrades to
//! `Explanation::Unavailable` and never touches the verdict.

pub mod engine;
pub mod strategy;
pub mod types;

pub use engine::{explain, explain_model, rank_contributions, Explainer};
pub use strategy::{
    positive_class_index, Attribution, AttributionStrategy, ExplainError, LinearAttribution,
    TreePathAttribution,
};
pub use types::{describe_feature, Explanation, FeatureContribution};
