//! Route handlers.

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tower::ServiceExt;

use crate::health::StatusReport;
use crate::http::server::AppState;

/// `GET /health`: 200 with a connected database, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let snapshot = state.health.snapshot();
    let status = if snapshot.is_connected() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(snapshot)).into_response()
}

#[derive(Debug, Serialize)]
struct Endpoints {
    health: &'static str,
    api: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiInfo {
    message: &'static str,
    version: &'static str,
    environment: String,
    endpoints: Endpoints,
}

/// `GET /api`
pub async fn api_info(State(state): State<AppState>) -> Json<impl Serialize> {
    Json(ApiInfo {
        message: "Pulse API",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.health.environment().to_string(),
        endpoints: Endpoints {
            health: "/health",
            api: "/api",
            status: "/api/status",
        },
    })
}

/// `GET /api/status`
pub async fn api_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.health.status_report())
}

/// `GET /api/test`
pub async fn api_test() -> Json<serde_json::Value> {
    Json(json!({ "message": "API test endpoint working!" }))
}

/// Anything no route claimed. Serves the client build for GET and HEAD when
/// one is mounted, otherwise the structured 404.
pub async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    if let Some(spa) = &state.spa {
        if method == Method::GET || method == Method::HEAD {
            return match spa.clone().oneshot(request).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            };
        }
    }

    let path = request.uri().path();
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Cannot {method} {path}"),
            "statusCode": 404,
        })),
    )
        .into_response()
}
