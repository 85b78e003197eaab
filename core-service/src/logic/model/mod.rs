//! Model Module - Fitted pipeline, inference cache, decision threshold
//!
//! The scoring model is an external collaborator; everything here treats it
//! through the `ScoringModel` trait.

pub mod inference;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod threshold;

// Re-export common types
pub use inference::{get_or_load, positive_probability, InferenceError, LoadedModel, ModelMetadata, ScoringModel};
pub use pipeline::{Estimator, NamedStep, PipelineModel, Preprocessor, Stage};
pub use threshold::{classify, Decision, DecisionThreshold, RiskLabel, ThresholdError};
