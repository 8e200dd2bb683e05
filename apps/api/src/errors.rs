use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    /// Upstream failure; a 5xx tells the queue to redeliver.
    #[error("Retryable failure: {0}")]
    Retryable(String),
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Store(e) => AppError::Database(e),
            PipelineError::Transient(msg) => AppError::Retryable(msg),
            PipelineError::JobNotFound(id) => AppError::NotFound(format!("Job {id} not found")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or missing request signature".to_string(),
            ),
            AppError::Database(StoreError::Conflict(what)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{what} already exists"),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Retryable(msg) => {
                tracing::warn!("Retryable failure: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RETRYABLE",
                    "Temporary upstream failure, retry later".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
