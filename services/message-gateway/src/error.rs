//! Error types for the message gateway

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use relay_protocol::ForwardResponse;

/// Errors raised by the gateway outside of request handling
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message sender error: {0}")]
    Sender(String),

    #[error("Messaging client is not ready")]
    NotReady,
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// A rejected request, rendered as a JSON failure body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Forbidden,
    MethodNotAllowed,
    Unauthorized,
    PayloadTooLarge,
    TooManyRequests,
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Forbidden => "Access denied",
            ApiError::MethodNotAllowed => "Method not allowed",
            ApiError::Unauthorized => "Invalid authentication token",
            ApiError::PayloadTooLarge => "Request body too large",
            ApiError::TooManyRequests => "Too many requests",
            ApiError::BadRequest(message) => message,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Sender(message) => ApiError::BadRequest(message),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Only processing failures carry a timestamp
        let timestamp = match self {
            ApiError::BadRequest(_) => Some(crate::status::timestamp()),
            _ => None,
        };
        let body = Json(ForwardResponse::failure(self.message(), timestamp));

        if self == ApiError::PayloadTooLarge {
            return (status, [(header::CONNECTION, "close")], body).into_response();
        }
        (status, body).into_response()
    }
}
