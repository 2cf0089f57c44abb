use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Unified error type for the Polyport service
#[derive(Error, Debug)]
pub enum PolyportError {
    // Record errors
    #[error("Record not found: {id}")]
    RecordNotFound { id: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Polyport operations
pub type Result<T> = std::result::Result<T, PolyportError>;

impl PolyportError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            PolyportError::InvalidRequest(_) | PolyportError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            PolyportError::RecordNotFound { .. } | PolyportError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }

            // 500 Internal Server Error
            PolyportError::Serialization(_)
            | PolyportError::Io(_)
            | PolyportError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code sent alongside the message
    pub fn error_code(&self) -> &'static str {
        match self {
            PolyportError::RecordNotFound { .. } | PolyportError::NotFound(_) => "not_found",
            PolyportError::InvalidRequest(_) => "invalid_request",
            PolyportError::InvalidConfig(_) => "invalid_config",
            PolyportError::Serialization(_) => "serialization",
            PolyportError::Io(_) => "io",
            PolyportError::Internal(_) => "internal",
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for PolyportError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            error_code: Some(self.error_code().to_string()),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_code_mapping() {
        assert_eq!(
            PolyportError::InvalidRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PolyportError::InvalidConfig("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PolyportError::RecordNotFound { id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PolyportError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_client_server_helpers() {
        assert!(PolyportError::InvalidRequest("bad".to_string()).is_client_error());
        assert!(!PolyportError::InvalidRequest("bad".to_string()).is_server_error());

        assert!(PolyportError::Internal("boom".to_string()).is_server_error());
        assert!(!PolyportError::Internal("boom".to_string()).is_client_error());
    }

    #[tokio::test]
    async fn test_error_response_body() {
        use http_body_util::BodyExt;

        let response = PolyportError::RecordNotFound { id: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Record not found: 7");
        assert_eq!(body["error_code"], "not_found");
    }
}
