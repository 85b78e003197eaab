//! Form page and prediction handlers

use axum::{extract::State, response::Html, Form, Json};
use validator::Validate;

use crash_risk_core::{DecisionThreshold, PredictionReport};

use crate::error::HtmlResult;
use crate::form::PredictForm;
use crate::{views, AppResult, AppState};

fn run(state: &AppState, form: &PredictForm) -> AppResult<PredictionReport> {
    form.validate()?;
    let threshold = DecisionThreshold::new(form.threshold)?;
    let report = state.predictor.predict(&form.to_input(), threshold)?;

    tracing::debug!(
        id = %report.id,
        probability = report.probability,
        label = %report.label,
        "Prediction served"
    );
    Ok(report)
}

/// Empty form with defaults pre-selected
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(views::page(&PredictForm::default(), None, state.predictor.metadata()))
}

/// Form submission -> result page (form stays filled in)
pub async fn submit(
    State(state): State<AppState>,
    Form(form): Form<PredictForm>,
) -> HtmlResult<Html<String>> {
    let report = run(&state, &form)?;
    Ok(Html(views::page(&form, Some(&report), state.predictor.metadata())))
}

/// JSON form input -> JSON report
pub async fn predict(
    State(state): State<AppState>,
    Json(form): Json<PredictForm>,
) -> AppResult<Json<PredictionReport>> {
    Ok(Json(run(&state, &form)?))
}
