//! Severe Injury Risk Predictor - Core Library
//!
//! Turns crash-report field values into a single risk verdict:
//!
//! ```text
//! codes -> selector -> record -> schema guard -> confidence -> decision -> explanation
//! ```
//!
//! The fitted classifier is an external collaborator loaded from disk and
//! cached process-wide (see [`logic::model::inference`]).

pub mod constants;
pub mod logic;

pub use logic::codes::{CodeTable, FieldSelector};
pub use logic::features::{CrashRecord, FormInput, InputError, OrderedRecord, SchemaError, EXPECTED_COLUMNS};
pub use logic::model::{Decision, DecisionThreshold, InferenceError, RiskLabel, ScoringModel};
pub use logic::explain::{Explanation, FeatureContribution};
pub use logic::predictor::{PredictError, PredictionReport, Predictor};
