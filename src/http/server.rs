//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router with all handlers
//! - Wire up layers (request ID, pipeline, panic capture)
//! - Mount the client build in production
//!
//! Layer order, outermost first:
//! ```text
//! SetRequestId → PropagateRequestId → Pipeline → CatchPanic → routes / fallback
//! ```

use axum::routing::get;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::config::AppConfig;
use crate::health::HealthState;
use crate::http::handlers;
use crate::http::request::{panic_to_error, MakeRequestUuid};
use crate::pipeline::{pipeline_middleware, Pipeline};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthState,
    /// Client build, mounted only in production when it exists on disk.
    pub spa: Option<ServeDir<ServeFile>>,
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, health: HealthState) -> Self {
        let state = AppState {
            health,
            spa: client_build(config),
        };
        let router = Self::build_router(config, state);
        Self { router }
    }

    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Self::with_layers(config, Self::routes()).with_state(state)
    }

    fn routes() -> Router<AppState> {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api", get(handlers::api_info))
            .route("/api/status", get(handlers::api_status))
            .route("/api/test", get(handlers::api_test))
            .fallback(handlers::fallback)
            .method_not_allowed_fallback(handlers::fallback)
    }

    fn with_layers(config: &AppConfig, routes: Router<AppState>) -> Router<AppState> {
        let pipeline = Arc::new(Pipeline::from_config(config));

        routes
            .layer(CatchPanicLayer::custom(panic_to_error))
            .layer(middleware::from_fn_with_state(pipeline, pipeline_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

fn client_build(config: &AppConfig) -> Option<ServeDir<ServeFile>> {
    if !config.environment.is_production() {
        return None;
    }

    let dist = &config.frontend.dist_dir;
    let index = config.frontend.index_file();
    if !index.is_file() {
        tracing::warn!(
            dist_dir = %dist.display(),
            "Client build not found, unmatched paths will return 404"
        );
        return None;
    }

    tracing::info!(dist_dir = %dist.display(), "Serving client build");
    Some(ServeDir::new(dist).fallback(ServeFile::new(index)))
}
