//! Request identification and panic capture.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) unless the client sent one
//! - Turn handler panics into errors the pipeline can render
//!
//! # Design Decisions
//! - Request ID added as early as possible, before the pipeline, so the
//!   access log and the response both carry it

use axum::http::{HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use std::any::Any;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::error::ApiError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// `CatchPanicLayer` hook: the panic becomes an untyped internal error.
pub fn panic_to_error(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(message).into_response()
}
