//! Body decoding with a size ceiling.
//!
//! # Responsibilities
//! - Buffer and decode JSON and form-encoded bodies
//! - Enforce the body size ceiling (413 Payload Too Large)
//! - Reject malformed bodies (400 Bad Request)
//!
//! # Design Decisions
//! - Declared Content-Length checked before reading (early rejection)
//! - Other content types stream through unread
//! - JSON is strict: only objects and arrays at the top level

use axum::http::header;
use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::ApiError;
use crate::pipeline::{DecodedBody, Outcome, RequestContext, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

/// Pipeline stage decoding request bodies.
pub struct BodyDecoder {
    limit: usize,
}

impl BodyDecoder {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    async fn decode(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let Some(kind) = body_kind(ctx) else {
            return Ok(());
        };

        let declared = ctx
            .header(header::CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.limit as u64) {
            return Err(ApiError::PayloadTooLarge { limit: self.limit });
        }

        let bytes = match Limited::new(ctx.take_body(), self.limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(ApiError::PayloadTooLarge { limit: self.limit });
            }
            Err(e) => return Err(ApiError::InvalidBody(format!("failed to read body: {e}"))),
        };

        let decoded = match kind {
            BodyKind::Json => decode_json(&bytes)?,
            BodyKind::Form => Some(decode_form(&bytes)),
        };
        ctx.set_body(bytes, decoded);
        Ok(())
    }
}

fn body_kind(ctx: &RequestContext) -> Option<BodyKind> {
    let content_type = ctx.header(header::CONTENT_TYPE)?;
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json")) {
        Some(BodyKind::Json)
    } else if mime == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else {
        None
    }
}

fn decode_json(bytes: &Bytes) -> Result<Option<DecodedBody>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    if !(value.is_object() || value.is_array()) {
        return Err(ApiError::InvalidBody(
            "JSON body must be an object or an array".to_string(),
        ));
    }
    Ok(Some(DecodedBody::Json(value)))
}

fn decode_form(bytes: &Bytes) -> DecodedBody {
    let pairs = url::form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    DecodedBody::Form(pairs)
}

impl Stage for BodyDecoder {
    fn name(&self) -> &'static str {
        "body_decoder"
    }

    fn on_request<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome> {
        async move {
            match self.decode(ctx).await {
                Ok(()) => Outcome::Continue,
                Err(e) => Outcome::Fail(e),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;

    fn ctx(content_type: &str, body: impl Into<Body>) -> RequestContext {
        let req = Request::builder()
            .method("POST")
            .uri("/api/test")
            .header("content-type", content_type)
            .body(body.into())
            .unwrap();
        RequestContext::from_request(req)
    }

    #[tokio::test]
    async fn test_decodes_json_object() {
        let mut ctx = ctx("application/json; charset=utf-8", r#"{"name":"pulse"}"#);
        BodyDecoder::new(1024).decode(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.decoded_body(),
            Some(&DecodedBody::Json(serde_json::json!({"name": "pulse"})))
        );

        // The raw bytes are still there for the handler.
        let forwarded = ctx.take_request();
        let body = axum::body::to_bytes(forwarded.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"name":"pulse"}"#);
    }

    #[tokio::test]
    async fn test_decodes_form() {
        let mut ctx = ctx("application/x-www-form-urlencoded", "a=1&b=hello+world");
        BodyDecoder::new(1024).decode(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.decoded_body(),
            Some(&DecodedBody::Form(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "hello world".to_string()),
            ]))
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let mut ctx = ctx("application/json", "{not json");
        let err = BodyDecoder::new(1024).decode(&mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_strict_json_rejects_primitives() {
        let mut ctx = ctx("application/json", "42");
        let err = BodyDecoder::new(1024).decode(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_empty_json_body_is_fine() {
        let mut ctx = ctx("application/json", "");
        BodyDecoder::new(1024).decode(&mut ctx).await.unwrap();
        assert!(ctx.decoded_body().is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_while_reading() {
        let mut ctx = ctx("application/json", vec![b' '; 2048]);
        let err = BodyDecoder::new(1024).decode(&mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_declared_length_checked_first() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .header("content-length", "999999")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::from_request(req);
        let err = BodyDecoder::new(1024).decode(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_other_content_types_are_untouched() {
        let mut ctx = ctx("text/plain", vec![b'x'; 4096]);
        BodyDecoder::new(1024).decode(&mut ctx).await.unwrap();
        assert!(ctx.decoded_body().is_none());
        let forwarded = ctx.take_request();
        let body = axum::body::to_bytes(forwarded.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 4096);
    }
}
