//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use super::orchestrator::TaskError;

/// Errors returned by route handlers, rendered as `{"error": ...}`.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Another task is already running")]
    Conflict { current_task: Option<String> },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::NotInitialized => ApiError::Internal(e.to_string()),
            TaskError::AlreadyRunning { current_task } => ApiError::Conflict { current_task },
            TaskError::InvalidTask | TaskError::NotRunning => ApiError::InvalidArgument(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Conflict { current_task } => json!({
                "error": self.to_string(),
                "current_task": current_task,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
