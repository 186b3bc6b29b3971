//! HTTP surface of the session bridge.
//!
//! Routes:
//!
//! - `GET /health` liveness probe
//! - `POST /mcp` one JSON-RPC call (or batch) for a session
//! - `GET /mcp` redirect to `/sse`
//! - `DELETE /mcp` drop a session
//! - `GET /sse` open a streaming session

mod handlers;

use std::any::Any;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::bridge::{SESSION_ID_HEADER, SessionRegistry};
use crate::config::CorsConfig;

/// Shared application state passed to axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Cancelled on shutdown; ends open event streams.
    pub shutdown: CancellationToken,
}

/// Builds the axum router with all routes and layers.
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/mcp",
            get(handlers::redirect_to_stream)
                .post(handlers::post_message)
                .delete(handlers::delete_session),
        )
        .route("/sse", get(handlers::open_stream))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Generic failure body. Internal details stay in the logs.
pub fn failure_response(status: StatusCode) -> Response {
    let message = if status.is_client_error() {
        "Bad request"
    } else {
        "Internal server error"
    };
    (status, axum::Json(json!({ "error": message }))).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "handler panicked");
    failure_response(StatusCode::INTERNAL_SERVER_ERROR)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins = if cors.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(cors.allow_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| warn!(%origin, error = %e, "ignoring invalid CORS origin"))
                .ok()
        }))
    };

    let methods: Vec<Method> = cors
        .allow_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect();
    let headers: Vec<HeaderName> = cors
        .allow_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
}
