//! Error handling

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

use crash_risk_core::logic::model::ThresholdError;
use crash_risk_core::{PredictError, SchemaError};

use crate::views;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Input errors
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    // Model errors
    #[error("{0}")]
    ScoringError(String),

    // Generic errors
    #[error("{0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ScoringError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user
    pub fn public_message(&self) -> String {
        match self {
            AppError::ScoringError(msg) => {
                tracing::error!("Scoring error: {}", msg);
                format!("Scoring failed: {}", msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Input(e) => AppError::ValidationError(e.to_string()),
            PredictError::Schema(e) => AppError::Schema(e),
            PredictError::Threshold(e) => AppError::ValidationError(e.to_string()),
            PredictError::Inference(e) => AppError::ScoringError(e.to_string()),
        }
    }
}

impl From<ThresholdError> for AppError {
    fn from(err: ThresholdError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let detail = errors
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "out of range".to_string());
                format!("{}: {}", field, detail)
            })
            .collect();
        fields.sort();
        AppError::ValidationError(format!("Invalid input ({})", fields.join(", ")))
    }
}

/// Same error rendered as an HTML page for the form routes
#[derive(Debug)]
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        HtmlError(err)
    }
}

impl From<PredictError> for HtmlError {
    fn from(err: PredictError) -> Self {
        HtmlError(err.into())
    }
}

impl From<validator::ValidationErrors> for HtmlError {
    fn from(err: validator::ValidationErrors) -> Self {
        HtmlError(err.into())
    }
}

impl From<ThresholdError> for HtmlError {
    fn from(err: ThresholdError) -> Self {
        HtmlError(err.into())
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Html(views::error_page(status, &self.0.public_message()))).into_response()
    }
}

pub type HtmlResult<T> = Result<T, HtmlError>;
