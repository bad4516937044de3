//! Error types for the HTTP layer
//!
//! Only transport problems become error responses. Unsupported or
//! unreadable documents are successful requests with a structured result.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Extraction timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Upload error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Timeout(secs) => {
                tracing::error!("Extraction timed out after {}s", secs);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "timeout",
                    format!("Extraction did not finish within {} seconds", secs),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Multipart(e) => {
                tracing::error!("Failed to read multipart upload: {}", e);
                let status = e.status();
                let error_type = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "bad_request"
                };
                (status, error_type, e.body_text())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_type.to_string(),
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::BadRequest("no file".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Timeout(120).into_response().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::Internal("join".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
