use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, PipelineError};
use crate::handlers::AppState;
use crate::ml::preprocess::{prepare_series, preprocess};
use crate::models::{
    EvaluateQueryParams, ForecastMethod, ForecastMetrics, ForecastRequest, ForecastResult,
    ForecastSummary,
};
use crate::session::{Session, StoredForecast};

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub dataset_id: Uuid,
    pub method: ForecastMethod,
    pub periods: usize,
    pub generated_at: DateTime<Utc>,
    pub forecast: ForecastResult,
    pub summary: ForecastSummary,
}

impl ForecastResponse {
    fn new(dataset_id: Uuid, stored: StoredForecast) -> Self {
        Self {
            dataset_id,
            method: stored.method,
            periods: stored.periods,
            generated_at: stored.generated_at,
            summary: ForecastSummary::from(&stored.result),
            forecast: stored.result,
        }
    }
}

fn parse_method(name: Option<&str>) -> Result<ForecastMethod, PipelineError> {
    name.map(str::parse).transpose().map(Option::unwrap_or_default)
}

/// Target series to forecast from: the preprocessed target in row order, or
/// the date-sorted series when `chronological` is set.
fn target_series(session: &Session, chronological: bool) -> Result<Vec<f64>, PipelineError> {
    session.roles.require_target()?;
    if chronological {
        prepare_series(&session.table, &session.roles)
    } else {
        Ok(preprocess(&session.table, &session.roles).y)
    }
}

fn stored_forecast(id: Uuid, session: Session) -> Result<StoredForecast, AppError> {
    session
        .forecast
        .ok_or_else(|| AppError::not_found("Forecast for dataset", &id.to_string()))
}

pub async fn generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, AppError> {
    let config = &state.config.forecast;
    let periods = req.periods.unwrap_or(config.default_periods);
    if periods == 0 || periods > config.max_periods {
        return Err(PipelineError::invalid(format!(
            "periods must be between 1 and {}, got {periods}",
            config.max_periods
        ))
        .into());
    }
    let method = parse_method(req.method.as_deref())?;
    let confidence_level = req.confidence_level.unwrap_or(config.default_confidence);

    let session = state.session(id).await?;
    let y = target_series(&session, req.chronological)?;
    let result = state
        .forecaster
        .forecast_with_method_confidence(&y, periods, method, confidence_level)?;

    let stored = StoredForecast {
        method,
        periods,
        result,
        generated_at: Utc::now(),
    };
    if !state.sessions.set_forecast(id, stored.clone()).await {
        return Err(AppError::not_found("Dataset", &id.to_string()));
    }
    tracing::info!(dataset_id = %id, %method, periods, history = y.len(), "Forecast generated");

    Ok(Json(ForecastResponse::new(id, stored)))
}

pub async fn get_latest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ForecastResponse>, AppError> {
    let session = state.session(id).await?;
    let stored = stored_forecast(id, session)?;
    Ok(Json(ForecastResponse::new(id, stored)))
}

pub async fn export_csv(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(id).await?;
    let csv = stored_forecast(id, session)?.result.to_csv()?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=forecast-{id}.csv"),
            ),
        ],
        csv,
    ))
}

/// Backtest a method against the last `holdout` points of the series.
/// Defaults to a fifth of the history.
pub async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<EvaluateQueryParams>,
) -> Result<Json<ForecastMetrics>, AppError> {
    let method = parse_method(params.method.as_deref())?;
    let session = state.session(id).await?;
    let y = target_series(&session, false)?;
    let holdout = params.holdout.unwrap_or((y.len() / 5).max(1));

    state
        .forecaster
        .evaluate_holdout(&y, holdout, method)
        .map(Json)
        .ok_or_else(|| {
            AppError::unprocessable(
                "INSUFFICIENT_DATA",
                format!("cannot hold out {holdout} of {} points", y.len()),
            )
        })
}
