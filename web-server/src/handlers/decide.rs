//! Relabel a stored probability without re-scoring

use axum::Json;
use serde::Deserialize;

use crash_risk_core::{Decision, DecisionThreshold};

use crate::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub probability: f64,
    #[serde(default)]
    pub threshold: Option<f64>,
}

pub async fn decide(Json(req): Json<DecideRequest>) -> AppResult<Json<Decision>> {
    if !req.probability.is_finite() || !(0.0..=1.0).contains(&req.probability) {
        return Err(AppError::ValidationError(format!(
            "Probability {} outside [0, 1]",
            req.probability
        )));
    }

    let threshold = match req.threshold {
        Some(t) => DecisionThreshold::new(t)?,
        None => DecisionThreshold::default(),
    };
    Ok(Json(Decision::new(req.probability, threshold)))
}
