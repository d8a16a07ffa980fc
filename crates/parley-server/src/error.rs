use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_shared::ValidationError;
use parley_store::StoreError;
use thiserror::Error;

use crate::completion::GenerationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Failed to generate response")]
    Generation(#[from] GenerationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Message not found: {id}")),
            StoreError::Validation(v) => ApiError::Validation(v.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retryable) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), false),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string(), false),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), false),
            ApiError::Generation(e) => {
                tracing::warn!(error = %e, "Completion failed");
                (StatusCode::BAD_GATEWAY, self.to_string(), true)
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    false,
                )
            }
        };

        let body = if retryable {
            serde_json::json!({ "error": message, "retryable": true })
        } else {
            serde_json::json!({ "error": message })
        };

        (status, axum::Json(body)).into_response()
    }
}
