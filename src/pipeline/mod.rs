//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Request ingress (RequestContext)
//!     → security::headers::SecurityHeaders    (response side: protective headers)
//!     → security::access_control::OriginGate  (Origin allow-list, CORS headers, preflight)
//!     → security::limits::BodyDecoder         (JSON / form decoding, size ceiling)
//!     → observability::access_log::AccessLog  (method, path, status, latency)
//!     → routing (axum Router: handlers, SPA catch-all, not-found fallback)
//!     → http::response::ErrorHandler          (terminal: any Fail or tagged ApiError)
//! Response egress: on_response hooks in reverse order, for entered stages only
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit ordered list driven by one dispatcher loop
//! - A stage either continues, responds directly, or fails with an ApiError
//! - Stages that were never reached do not see the response

pub mod context;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::http::response::ErrorHandler;
use crate::observability::access_log::AccessLog;
use crate::observability::logging::SERVICE_NAME;
use crate::security::access_control::{OriginGate, OriginPolicy};
use crate::security::headers::SecurityHeaders;
use crate::security::limits::BodyDecoder;

pub use context::{DecodedBody, RequestContext};

/// What a stage decided about the request.
pub enum Outcome {
    /// Hand the (possibly modified) context to the next stage.
    Continue,
    /// Short-circuit with this response.
    Respond(Response),
    /// Short-circuit through the error handler.
    Fail(ApiError),
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect or modify the request on the way in.
    fn on_request<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome>;

    /// Inspect or modify the response on the way out.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Ordered stages plus the terminal error handler.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    errors: ErrorHandler,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, errors: ErrorHandler) -> Self {
        Self { stages, errors }
    }

    /// The standard stage order for the given configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let policy = OriginPolicy::from_config(config.environment, config.cors.allowed_origins.as_deref());
        let csp = config
            .security
            .content_security_policy
            .unwrap_or(config.environment.is_production());

        tracing::info!(
            origin_policy = %policy,
            content_security_policy = csp,
            max_body_bytes = config.security.max_body_bytes,
            "Request pipeline configured"
        );

        Self::new(
            vec![
                Box::new(SecurityHeaders::new(csp)),
                Box::new(OriginGate::new(policy)),
                Box::new(BodyDecoder::new(config.security.max_body_bytes)),
                Box::new(AccessLog::new()),
            ],
            ErrorHandler::new(config.environment),
        )
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Drive one request through the stages, calling `route` if none of them
    /// short-circuits.
    pub async fn run<F, Fut>(&self, request: Request, route: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut ctx = RequestContext::from_request(request);
        let mut entered = 0;
        let mut short_circuit = None;

        for stage in &self.stages {
            entered += 1;
            match stage.on_request(&mut ctx).await {
                Outcome::Continue => {}
                Outcome::Respond(response) => {
                    short_circuit = Some(response);
                    break;
                }
                Outcome::Fail(err) => {
                    short_circuit = Some(self.errors.render(&ctx, err));
                    break;
                }
            }
        }

        let mut response = match short_circuit {
            Some(response) => response,
            None => {
                let mut response = route(ctx.take_request()).await;
                match response.extensions_mut().remove::<ApiError>() {
                    Some(err) => self.errors.render(&ctx, err),
                    None => response,
                }
            }
        };

        for stage in self.stages[..entered].iter().rev() {
            stage.on_response(&ctx, &mut response);
        }
        response
    }
}

/// Axum middleware entry point.
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let span = tracing::info_span!("request", service = SERVICE_NAME);
    pipeline
        .run(request, |req| next.run(req))
        .instrument(span)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use futures_util::FutureExt;
    use std::sync::Mutex;

    /// Records every hook call into a shared journal.
    struct Probe {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        outcome: fn() -> Outcome,
    }

    impl Stage for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_request<'a>(&'a self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, Outcome> {
            self.journal.lock().unwrap().push(format!("{}:req", self.name));
            futures_util::future::ready((self.outcome)()).boxed()
        }

        fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
            self.journal.lock().unwrap().push(format!("{}:res", self.name));
            response
                .headers_mut()
                .append("x-stage", HeaderValue::from_static(self.name));
        }
    }

    fn probe(name: &'static str, journal: &Arc<Mutex<Vec<String>>>, outcome: fn() -> Outcome) -> Box<dyn Stage> {
        Box::new(Probe {
            name,
            journal: journal.clone(),
            outcome,
        })
    }

    fn request() -> Request {
        Request::builder().uri("/x").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_unwind_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            vec![
                probe("a", &journal, || Outcome::Continue),
                probe("b", &journal, || Outcome::Continue),
            ],
            ErrorHandler::new(Environment::Test),
        );

        let j = journal.clone();
        let response = pipeline
            .run(request(), |_req| async move {
                j.lock().unwrap().push("route".to_string());
                StatusCode::OK.into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:req", "b:req", "route", "b:res", "a:res"]
        );
    }

    #[tokio::test]
    async fn test_respond_short_circuits_later_stages() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            vec![
                probe("a", &journal, || Outcome::Continue),
                probe("b", &journal, || Outcome::Respond(StatusCode::NO_CONTENT.into_response())),
                probe("c", &journal, || Outcome::Continue),
            ],
            ErrorHandler::new(Environment::Test),
        );

        let response = pipeline
            .run(request(), |_req| async { StatusCode::IM_A_TEAPOT.into_response() })
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*journal.lock().unwrap(), vec!["a:req", "b:req", "b:res", "a:res"]);
        let stages: Vec<_> = response.headers().get_all("x-stage").iter().collect();
        assert_eq!(stages, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_fail_goes_through_error_handler() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            vec![probe("a", &journal, || {
                Outcome::Fail(ApiError::InvalidBody("bad".into()))
            })],
            ErrorHandler::new(Environment::Test),
        );

        let response = pipeline
            .run(request(), |_req| async { StatusCode::IM_A_TEAPOT.into_response() })
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tagged_route_error_is_rendered() {
        let pipeline = Pipeline::new(Vec::new(), ErrorHandler::new(Environment::Production));

        let response = pipeline
            .run(request(), |_req| async {
                ApiError::internal("secret detail").into_response()
            })
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ApiError>().is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Internal Server Error", "statusCode": 500}));
    }

    #[test]
    fn test_standard_order() {
        let pipeline = Pipeline::from_config(&AppConfig::default());
        assert_eq!(
            pipeline.stage_names(),
            vec!["security_headers", "origin_policy", "body_decoder", "access_log"]
        );
    }
}
