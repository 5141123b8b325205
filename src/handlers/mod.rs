pub mod analytics;
pub mod datasets;
pub mod forecasts;
pub mod health;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::ml::forecast::Forecaster;
use crate::session::{Session, SessionStore};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub forecaster: Forecaster,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            sessions: SessionStore::new(config.sessions.max_sessions),
            forecaster: Forecaster::from_config(&config.forecast),
            config: Arc::new(config),
        }
    }

    pub(crate) async fn session(&self, id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| AppError::not_found("Dataset", &id.to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.upload.max_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/datasets", post(datasets::upload))
        .route("/api/v1/datasets/:id", get(datasets::get_by_id).delete(datasets::delete))
        .route("/api/v1/datasets/:id/features", get(datasets::features))
        .route("/api/v1/datasets/:id/forecast", get(forecasts::get_latest).post(forecasts::generate))
        .route("/api/v1/datasets/:id/forecast/export", get(forecasts::export_csv))
        .route("/api/v1/datasets/:id/forecast/evaluate", get(forecasts::evaluate))
        .route("/api/v1/datasets/:id/analytics", get(analytics::get_analytics))
        .route("/api/v1/datasets/:id/insights", get(analytics::get_insights))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
