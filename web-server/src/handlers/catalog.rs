//! Code dictionaries and model metadata

use axum::{extract::State, Json};

use crash_risk_core::logic::codes::CodeTableView;
use crash_risk_core::logic::model::ModelMetadata;

use crate::AppState;

/// Every dictionary with entries sorted by code
pub async fn codes() -> Json<Vec<CodeTableView>> {
    Json(CodeTableView::all())
}

pub async fn model(State(state): State<AppState>) -> Json<ModelMetadata> {
    Json(state.predictor.metadata().clone())
}
