//! API error types and JSON error response formatting.
//!
//! Every failure leaves the server as `{error, message}` with a status code
//! derived from the underlying chat or core error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use barista_chat::ChatError;
use barista_core::error::BaristaError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid input.
    BadRequest(String),
    /// 404 - unknown resource.
    NotFound(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 503 - a backing collaborator is not reachable.
    ServiceUnavailable(String),
    /// 504 - the turn did not finish within the configured bound.
    Timeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong(_)
            | ChatError::InvalidArguments { .. } => ApiError::BadRequest(err.to_string()),
            ChatError::UnknownTool(_) | ChatError::SessionNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::ReasoningUnavailable(_) | ChatError::SearchUnavailable(_) => {
                ApiError::ServiceUnavailable("A backing service is unavailable".to_string())
            }
            _ => {
                tracing::error!(error = %err, "Unhandled chat error");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<BaristaError> for ApiError {
    fn from(err: BaristaError) -> Self {
        match &err {
            BaristaError::Config(msg) => ApiError::BadRequest(msg.clone()),
            BaristaError::ShuttingDown => {
                ApiError::ServiceUnavailable("Server is shutting down".to_string())
            }
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_status_mapping() {
        let cases = [
            (ChatError::EmptyMessage, StatusCode::BAD_REQUEST),
            (ChatError::MessageTooLong(10), StatusCode::BAD_REQUEST),
            (
                ChatError::SessionNotFound(uuid::Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (
                ChatError::ReasoningUnavailable("connection refused".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ChatError::Storage("disk I/O error".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_timeout_is_504() {
        let resp = ApiError::Timeout("slow".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
