use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::Role;

/// Failures the pipeline reports to its caller.
///
/// Bad cells and short series are not errors: they degrade to missing
/// values, zero-filled features or a defined "no result" value. Only the
/// conditions below stop an operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("could not detect a {role} column")]
    MissingColumn { role: Role },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("could not read table: {0}")]
    Ingest(String),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::Ingest(err.to_string())
    }
}

impl From<calamine::Error> for PipelineError {
    fn from(err: calamine::Error) -> Self {
        Self::Ingest(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    fn new(status: StatusCode, code: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiError {
                code: code.into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id '{id}' not found"),
        )
    }

    pub fn unprocessable(code: &str, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.body.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingColumn { role } => {
                tracing::warn!(%role, "Required column not detected");
                Self::unprocessable("MISSING_COLUMN", err.to_string())
                    .with_details(serde_json::json!({ "role": role }))
            }
            PipelineError::InvalidConfiguration(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION", err.to_string())
            }
            PipelineError::Ingest(_) => {
                Self::new(StatusCode::BAD_REQUEST, "UNREADABLE_TABLE", err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", err);
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_maps_to_unprocessable() {
        let err: AppError = PipelineError::MissingColumn { role: Role::Target }.into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body.code, "MISSING_COLUMN");
        assert_eq!(err.body.message, "could not detect a target column");
    }

    #[test]
    fn test_invalid_configuration_maps_to_bad_request() {
        let err: AppError = PipelineError::invalid("unknown forecast method 'arima'").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "INVALID_CONFIGURATION");
    }
}
