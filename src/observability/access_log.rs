//! Access logging stage.
//!
//! One event per completed request with method, path, status and latency.
//! The subscriber decides the rendering (coloured text in development, JSON
//! in production); the fields are the same in both.

use axum::extract::ConnectInfo;
use axum::http::header;
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::pipeline::{Outcome, RequestContext, Stage};

#[derive(Debug, Clone)]
struct AccessStart {
    at: Instant,
    remote: Option<SocketAddr>,
}

/// Pipeline stage writing the access log.
#[derive(Debug, Default)]
pub struct AccessLog;

impl AccessLog {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn on_request<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome> {
        let remote = ctx
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        ctx.locals_mut().insert(AccessStart {
            at: Instant::now(),
            remote,
        });
        futures_util::future::ready(Outcome::Continue).boxed()
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let (latency, remote) = match ctx.locals().get::<AccessStart>() {
            Some(start) => (start.at.elapsed(), start.remote),
            None => (ctx.elapsed(), None),
        };
        let status = response.status().as_u16();
        let url = ctx
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| ctx.path());
        let remote = remote.map(|addr| addr.to_string()).unwrap_or_default();

        tracing::info!(
            method = %ctx.method(),
            url = %url,
            status,
            latency_ms = latency.as_secs_f64() * 1000.0,
            content_length = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-"),
            remote_addr = %remote,
            user_agent = ctx.header(header::USER_AGENT).unwrap_or("-"),
            request_id = ctx.header(X_REQUEST_ID).unwrap_or("-"),
            "request completed"
        );

        metrics::record_request(ctx.method().as_str(), status, latency);
    }
}
