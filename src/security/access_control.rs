//! Origin policy and the CORS stage.
//!
//! The policy is computed once from `FRONTEND_URL` at startup and never
//! re-read; changing it requires a restart.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::{BoxFuture, FutureExt};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use crate::config::Environment;
use crate::error::ApiError;
use crate::pipeline::{Outcome, RequestContext, Stage};

const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Which origins may call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Development default: any origin.
    AllowAll,
    /// Exact, case-sensitive allow-list. Empty rejects every origin.
    AllowList(BTreeSet<String>),
}

/// Verdict for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    Permit,
    Reject(&'static str),
}

impl OriginPolicy {
    /// Build the policy from the environment and the raw `FRONTEND_URL`.
    ///
    /// An explicit list wins in every environment. Without one, production
    /// gets an empty allow-list and everything else allows all origins.
    pub fn from_config(environment: Environment, allowed_origins: Option<&str>) -> Self {
        match allowed_origins {
            Some(raw) => OriginPolicy::AllowList(parse_origins(raw)),
            None if environment.is_production() => OriginPolicy::AllowList(BTreeSet::new()),
            None => OriginPolicy::AllowAll,
        }
    }

    /// Decide whether `origin` may proceed. Requests without an origin
    /// (curl, server-to-server, mobile apps) are always permitted.
    pub fn evaluate(&self, origin: Option<&str>) -> OriginDecision {
        let Some(origin) = origin else {
            return OriginDecision::Permit;
        };

        match self {
            OriginPolicy::AllowAll => OriginDecision::Permit,
            OriginPolicy::AllowList(allowed) if allowed.contains(origin) => OriginDecision::Permit,
            OriginPolicy::AllowList(_) => {
                tracing::warn!(origin = %origin, "Rejected request from unauthorized origin");
                OriginDecision::Reject("origin not allowlisted")
            }
        }
    }
}

impl fmt::Display for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginPolicy::AllowAll => f.write_str("allow-all"),
            OriginPolicy::AllowList(set) if set.is_empty() => f.write_str("allow-list(empty)"),
            OriginPolicy::AllowList(set) => {
                let list: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "allow-list({})", list.join(","))
            }
        }
    }
}

fn parse_origins(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Marker left in the context's locals for an origin that passed the policy.
#[derive(Debug, Clone)]
struct GrantedOrigin(HeaderValue);

/// Pipeline stage enforcing the [`OriginPolicy`].
pub struct OriginGate {
    policy: OriginPolicy,
}

impl OriginGate {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    fn decide(&self, ctx: &mut RequestContext) -> Outcome {
        let origin = ctx.origin().map(Cow::into_owned);

        if let OriginDecision::Reject(reason) = self.policy.evaluate(origin.as_deref()) {
            tracing::debug!(reason, path = %ctx.path(), "Origin gate closed");
            return Outcome::Fail(ApiError::OriginRejected {
                origin: origin.unwrap_or_default(),
            });
        }

        // Echo the header as received, not the lossy decoding.
        let granted = ctx.headers().get(header::ORIGIN).cloned();
        if let (Some(_), Some(value)) = (origin, granted) {
            ctx.locals_mut().insert(GrantedOrigin(value));
        }

        if is_preflight(ctx) {
            let mut response = StatusCode::OK.into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            if let Some(requested) = ctx.headers().get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
                headers.append(
                    header::VARY,
                    HeaderValue::from_static("Access-Control-Request-Headers"),
                );
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            return Outcome::Respond(response);
        }

        Outcome::Continue
    }
}

fn is_preflight(ctx: &RequestContext) -> bool {
    *ctx.method() == Method::OPTIONS
        && ctx.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

impl Stage for OriginGate {
    fn name(&self) -> &'static str {
        "origin_policy"
    }

    fn on_request<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome> {
        futures_util::future::ready(self.decide(ctx)).boxed()
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(GrantedOrigin(origin)) = ctx.locals().get::<GrantedOrigin>() else {
            return;
        };
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
