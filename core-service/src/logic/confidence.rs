//! Confidence Heuristic
//!
//! Share of record values equal to a shared "unknown" code. Advisory only:
//! prediction proceeds whatever the rate.
//!
//! The unknown set applies to every column, so a legitimately coded 8/9/98/99
//! (e.g. BODY_TYP 98) is counted as unknown too.

use serde::{Deserialize, Serialize};

use crate::constants::LOW_CONFIDENCE_FRACTION;
use crate::logic::codes::is_unknown_code;
use crate::logic::features::{OrderedRecord, COLUMN_COUNT};

pub const LOW_CONFIDENCE_WARNING: &str =
    "Many inputs are Unknown/Not reported. Prediction may be less reliable.";

/// Result of the unknown-rate check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    /// Fraction of the 16 values in the unknown set
    pub unknown_rate: f64,
    /// Columns whose value is an unknown code, in layout order
    pub unknown_columns: Vec<String>,
    /// `unknown_rate` strictly above the limit
    pub low_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ConfidenceAssessment {
    pub fn is_low(&self) -> bool {
        self.low_confidence
    }
}

/// Assess with the default 0.4 limit
pub fn assess(record: &OrderedRecord) -> ConfidenceAssessment {
    assess_with_limit(record, LOW_CONFIDENCE_FRACTION)
}

pub fn assess_with_limit(record: &OrderedRecord, limit: f64) -> ConfidenceAssessment {
    let unknown_columns: Vec<String> = record
        .iter()
        .filter(|(_, value)| is_unknown_code(*value))
        .map(|(column, _)| column.to_string())
        .collect();

    let unknown_rate = unknown_columns.len() as f64 / COLUMN_COUNT as f64;
    let low_confidence = unknown_rate > limit;

    if low_confidence {
        log::warn!(
            "Low confidence input: {}/{} unknown ({:?})",
            unknown_columns.len(),
            COLUMN_COUNT,
            unknown_columns
        );
    }

    ConfidenceAssessment {
        unknown_rate,
        unknown_columns,
        low_confidence,
        warning: low_confidence.then(|| LOW_CONFIDENCE_WARNING.to_string()),
    }
}
