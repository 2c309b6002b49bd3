//! Per-request context carried through the pipeline stages.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, Extensions, HeaderMap, Method, Uri, Version};
use bytes::Bytes;
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// A request body decoded by the body stage, attached to the request as an
/// extension for downstream handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Everything a stage may inspect or change about an in-flight request.
///
/// Created at ingress, consumed when the request is handed to routing, and
/// kept (without body) until the response has passed back through the stages.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    locals: Extensions,
    body: Body,
    decoded: Option<DecodedBody>,
    received_at: Instant,
}

impl RequestContext {
    pub fn from_request(request: Request) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            locals: Extensions::new(),
            body,
            decoded: None,
            received_at: Instant::now(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The declared `Origin`, treating an empty value as absent.
    ///
    /// Bytes outside visible ASCII are decoded lossily rather than dropped,
    /// so a malformed origin is still seen (and rejected) by the policy.
    pub fn origin(&self) -> Option<Cow<'_, str>> {
        self.headers
            .get(header::ORIGIN)
            .filter(|v| !v.is_empty())
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }

    /// Extensions forwarded to the handler.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Stage-private state. Never forwarded downstream.
    pub fn locals(&self) -> &Extensions {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Extensions {
        &mut self.locals
    }

    pub fn decoded_body(&self) -> Option<&DecodedBody> {
        self.decoded.as_ref()
    }

    /// Take the raw body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::empty())
    }

    /// Put back a buffered body along with its decoded form.
    pub fn set_body(&mut self, bytes: Bytes, decoded: Option<DecodedBody>) {
        self.body = Body::from(bytes);
        self.decoded = decoded;
    }

    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// Rebuild the request for routing. Body and forwarded extensions move
    /// out; method, URI and headers stay readable for the response phase.
    pub(crate) fn take_request(&mut self) -> Request {
        let mut request = Request::new(self.take_body());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = std::mem::take(&mut self.extensions);
        if let Some(decoded) = self.decoded.clone() {
            request.extensions_mut().insert(decoded);
        }
        request
    }
}
