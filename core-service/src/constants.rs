//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every default can be overridden from the environment through the helpers below.

/// Default location of the fitted pipeline, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "models/severe_injury_model.json";

/// Default decision threshold shown on the form
pub const DEFAULT_THRESHOLD: f64 = 0.25;

/// Lowest threshold the operator may choose
pub const MIN_THRESHOLD: f64 = 0.01;

/// Highest threshold the operator may choose
pub const MAX_THRESHOLD: f64 = 0.99;

/// Threshold control granularity
pub const THRESHOLD_STEP: f64 = 0.01;

/// Number of contributions kept in a local explanation
pub const DEFAULT_TOP_N: usize = 12;

/// Codes treated as "unknown / not reported" across every field
pub const UNKNOWN_CODES: [i64; 4] = [8, 9, 98, 99];

/// Unknown-code fraction above which a prediction is flagged as low confidence
pub const LOW_CONFIDENCE_FRACTION: f64 = 0.4;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Severe Injury Risk Predictor";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get model path from environment or use default
pub fn get_model_path() -> String {
    std::env::var("CRASH_RISK_MODEL_PATH")
        .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
}

/// Get explanation size from environment or use default
pub fn get_top_n() -> usize {
    std::env::var("CRASH_RISK_TOP_N")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_TOP_N)
}

/// Check if local explanations are enabled (on unless explicitly disabled)
pub fn is_explain_enabled() -> bool {
    std::env::var("CRASH_RISK_EXPLAIN")
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
        .unwrap_or(true)
}
