use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::ml::insights::{analytics_report, generate_insights};
use crate::models::{AnalyticsQueryParams, AnalyticsReport, Frequency, InsightReport};

pub async fn get_analytics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let freq = match params.freq.as_deref() {
        Some(name) => name.parse::<Frequency>()?,
        None => Frequency::default(),
    };
    let session = state.session(id).await?;
    Ok(Json(analytics_report(&session.table, &session.roles, freq)))
}

/// Insights combine the table with the latest stored forecast, so a forecast
/// must have been generated first.
pub async fn get_insights(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InsightReport>, AppError> {
    let session = state.session(id).await?;
    let Some(stored) = session.forecast.as_ref() else {
        return Err(AppError::not_found("Forecast for dataset", &id.to_string()));
    };
    Ok(Json(generate_insights(
        &session.table,
        &session.roles,
        Some(&stored.result.values),
    )))
}
