// src/api/error.rs

//! Centralized HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::memory::MemoryError;

/// Standard API error response format.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::NOT_FOUND,
        }
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        match &e {
            MemoryError::Validation(_) => ApiError::bad_request(e.to_string()),
            MemoryError::NotFound(_) => ApiError::not_found(e.to_string()),
            _ => {
                // Operation context in the body, no stack traces.
                error!("request failed: {e}");
                ApiError::internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16(),
        });
        (self.status_code, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e: ApiError = MemoryError::Validation("top_k must be at least 1".into()).into();
        assert_eq!(e.status_code, StatusCode::BAD_REQUEST);

        let e: ApiError = MemoryError::NotFound("m-1".into()).into();
        assert_eq!(e.status_code, StatusCode::NOT_FOUND);

        let e: ApiError = MemoryError::MetadataStore(anyhow::anyhow!("db gone")).into();
        assert_eq!(e.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.message.contains("db gone"));
    }
}
