//! Configuration module

use std::env;

use crash_risk_core::constants;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Fitted model file
    pub model_path: String,

    /// Contributions shown in the explanation chart
    pub explain_top_n: usize,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| constants::get_model_path()),

            explain_top_n: parse_top_n(env::var("EXPLAIN_TOP_N").ok()),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Positive integer, else the core default
fn parse_top_n(raw: Option<String>) -> usize {
    raw.and_then(|n| n.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(constants::get_top_n)
}
