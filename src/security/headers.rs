//! Protective response headers.
//!
//! # Responsibilities
//! - Add a fixed set of hardening headers to every response
//! - Add a content-security-policy in production (configurable)
//! - Never overwrite a header the handler chose to set
//!
//! # Design Decisions
//! - Runs first, so it also covers CORS rejections and error responses
//! - No Cross-Origin-Embedder-Policy header

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};

use crate::pipeline::{Outcome, RequestContext, Stage};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';\
script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests";

const BASELINE: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Pipeline stage attaching hardening headers.
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn new(content_security_policy: bool) -> Self {
        let mut headers: Vec<(HeaderName, HeaderValue)> = BASELINE
            .iter()
            .map(|&(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();

        if content_security_policy {
            headers.push((
                HeaderName::from_static("content-security-policy"),
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            ));
        }

        Self { headers }
    }
}

impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn on_request<'a>(&'a self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome> {
        futures_util::future::ready(Outcome::Continue).boxed()
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers.remove("x-powered-by");
    }
}
