//! Request-level error taxonomy.
//!
//! Handlers and pipeline stages never format errors themselves. Returning an
//! [`ApiError`] (or converting one into a response) only tags the response;
//! the terminal error handler in [`crate::http::response`] does the logging
//! and renders the client-facing body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that surface to HTTP clients.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The request's `Origin` is not on the allow-list.
    #[error("Not allowed by CORS")]
    OriginRejected { origin: String },

    /// The body exceeded the configured ceiling.
    #[error("request entity too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    /// The body could not be decoded.
    #[error("{0}")]
    InvalidBody(String),

    /// An error that carries its own status code.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Anything else. Has no status code of its own, so it renders as 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    /// The status code the error asked for, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ApiError::OriginRejected { .. } => Some(StatusCode::FORBIDDEN),
            ApiError::PayloadTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ApiError::InvalidBody(_) => Some(StatusCode::BAD_REQUEST),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Internal(_) => None,
        }
    }

    /// Short name used in logs and in the development `stack` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::OriginRejected { .. } => "OriginRejected",
            ApiError::PayloadTooLarge { .. } => "PayloadTooLarge",
            ApiError::InvalidBody(_) => "ValidationError",
            ApiError::Status { .. } => "HttpError",
            ApiError::Internal(_) => "Error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self
            .status_code()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_has_no_status() {
        assert_eq!(ApiError::internal("boom").status_code(), None);
        assert_eq!(
            ApiError::status(StatusCode::CONFLICT, "taken").status_code(),
            Some(StatusCode::CONFLICT)
        );
    }

    #[test]
    fn test_into_response_tags_extension() {
        let response = ApiError::InvalidBody("bad json".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let tagged = response.extensions().get::<ApiError>().unwrap();
        assert_eq!(tagged.to_string(), "bad json");
    }
}
