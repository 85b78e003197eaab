//! Severe Injury Risk Predictor - Web Server
//!
//! Serves the single-page form and a small JSON API over the core pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   CRASH RISK WEB                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌──────────────────────┐  │
//! │  │  Form     │  │  JSON     │  │  Catalog             │  │
//! │  │  (HTML)   │  │  API      │  │  (codes, model)      │  │
//! │  └─────┬─────┘  └─────┬─────┘  └──────────┬───────────┘  │
//! │        └──────────────┼───────────────────┘              │
//! │                       ▼                                  │
//! │              ┌─────────────────┐                         │
//! │              │ crash-risk-core │  (model cached once)    │
//! │              └─────────────────┘                         │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod form;
mod handlers;
mod views;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crash_risk_core::Predictor;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "crash_risk_web=debug,crash_risk_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("Crash Risk server starting ({})...", config.environment);

    // Model is loaded once up front; a missing file stops startup
    let predictor = Predictor::from_path(&config.model_path)
        .with_context(|| format!("Model file not found or unreadable: {}", config.model_path))?
        .with_top_n(config.explain_top_n);
    tracing::info!(
        "Model '{}' ready (sha256 {})",
        predictor.metadata().name,
        predictor.metadata().sha256
    );

    // Build application state
    let state = AppState {
        predictor,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Predictor,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // HTML form
    let page_routes = Router::new()
        .route("/", get(handlers::predict::index))
        .route("/predict", post(handlers::predict::submit));

    // JSON API
    let api_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/predict", post(handlers::predict::predict))
        .route("/api/v1/decide", post(handlers::decide::decide))
        .route("/api/v1/codes", get(handlers::catalog::codes))
        .route("/api/v1/model", get(handlers::catalog::model));

    let cors = if state.config.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(page_routes)
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
