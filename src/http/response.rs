//! Terminal error handling.
//!
//! # Responsibilities
//! - Log every error that reaches the end of the pipeline
//! - Map errors to status codes (their own, or 500)
//! - Render the client-facing JSON body
//!
//! # Design Decisions
//! - Production hides every message behind a fixed string, keeping the status
//! - The `stack` field only exists outside production
//! - Origin rejections render as a bare 403 with no CORS headers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::error::Error as _;

use crate::config::Environment;
use crate::error::ApiError;
use crate::pipeline::RequestContext;

const REDACTED: &str = "Internal Server Error";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

/// Renders errors raised anywhere in the request pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ErrorHandler {
    environment: Environment,
}

impl ErrorHandler {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn render(&self, ctx: &RequestContext, err: ApiError) -> Response {
        let stack = stack_of(&err);
        tracing::error!(
            error = %err,
            kind = err.kind(),
            stack = %stack,
            path = %ctx.path(),
            method = %ctx.method(),
            "Request failed"
        );

        if matches!(err, ApiError::OriginRejected { .. }) {
            return StatusCode::FORBIDDEN.into_response();
        }

        let status = err.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let production = self.environment.is_production();
        let message = if production {
            REDACTED.to_string()
        } else {
            err.to_string()
        };

        let body = ErrorBody {
            error: message,
            status_code: status.as_u16(),
            stack: (!production).then_some(stack),
        };
        (status, Json(body)).into_response()
    }
}

/// Error kind and message followed by each `source()` in the chain.
fn stack_of(err: &ApiError) -> String {
    let mut stack = format!("{}: {}", err.kind(), err);
    let mut source = err.source();
    while let Some(cause) = source {
        stack.push_str("\n    caused by: ");
        stack.push_str(&cause.to_string());
        source = cause.source();
    }
    stack
}
