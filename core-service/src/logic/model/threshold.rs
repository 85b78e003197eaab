//! Decision Threshold
//!
//! Operator-supplied cutoff mapping a probability to HIGH / LOW.
//! Not derived from the model and never persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_THRESHOLD, MAX_THRESHOLD, MIN_THRESHOLD};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Threshold {0} outside [{min}, {max}]", min = MIN_THRESHOLD, max = MAX_THRESHOLD)]
pub struct ThresholdError(pub f64);

/// Cutoff bounded to [0.01, 0.99]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DecisionThreshold(f64);

impl DecisionThreshold {
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && (MIN_THRESHOLD..=MAX_THRESHOLD).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for DecisionThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<f64> for DecisionThreshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DecisionThreshold> for f64 {
    fn from(t: DecisionThreshold) -> f64 {
        t.0
    }
}

impl std::fmt::Display for DecisionThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Binary risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLabel {
    High,
    Low,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::High => "HIGH",
            RiskLabel::Low => "LOW",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskLabel::High => "#ef4444", // Red
            RiskLabel::Low => "#10b981",  // Green
        }
    }

    /// Comparator shown next to the threshold
    pub fn comparator(&self) -> &'static str {
        match self {
            RiskLabel::High => "≥",
            RiskLabel::Low => "<",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HIGH when `p >= t` (inclusive)
pub fn classify(probability: f64, threshold: DecisionThreshold) -> RiskLabel {
    if probability >= threshold.value() {
        RiskLabel::High
    } else {
        RiskLabel::Low
    }
}

/// Probability paired with the threshold that labelled it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub probability: f64,
    pub threshold: DecisionThreshold,
    pub label: RiskLabel,
}

impl Decision {
    pub fn new(probability: f64, threshold: DecisionThreshold) -> Self {
        Self {
            probability,
            threshold,
            label: classify(probability, threshold),
        }
    }

    /// Relabel the same probability against another threshold, no re-scoring
    pub fn rethreshold(&self, threshold: DecisionThreshold) -> Self {
        Self::new(self.probability, threshold)
    }

    pub fn is_high(&self) -> bool {
        self.label == RiskLabel::High
    }

    /// Probability with 3 decimals, e.g. `0.274`
    pub fn probability_display(&self) -> String {
        format!("{:.3}", self.probability)
    }

    /// Probability as a percentage with 1 decimal, e.g. `27.4%`
    pub fn percentage_display(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }

    /// e.g. `HIGH risk (p ≥ 0.25)`
    pub fn summary(&self) -> String {
        format!("{} risk (p {} {})", self.label, self.label.comparator(), self.threshold)
    }
}
