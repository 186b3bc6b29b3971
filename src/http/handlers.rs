//! Route handlers.

use std::convert::Infallible;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::{AppState, failure_response};
use crate::bridge::{
    Adapted, ConfigOverride, LEGACY_SESSION_ID_HEADER, SESSION_ID_HEADER, SessionId, adapt,
    parse_body,
};

/// `?sessionId=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub(super) struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Session id from the query string, then the session headers. Empty values
/// count as absent.
fn session_id(query: SessionQuery, headers: &HeaderMap) -> Option<SessionId> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    query
        .session_id
        .filter(|id| !id.is_empty())
        .or_else(|| from_header(SESSION_ID_HEADER).filter(|id| !id.is_empty()))
        .or_else(|| from_header(LEGACY_SESSION_ID_HEADER).filter(|id| !id.is_empty()))
        .map(SessionId::from)
}

pub(super) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Feeds one JSON-RPC call to the caller's session, creating it on first use.
pub(super) async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = session_id(query, &headers);

    let message = match parse_body(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "rejecting request");
            return failure_response(StatusCode::BAD_REQUEST);
        }
    };

    let config = ConfigOverride::from_headers(&headers);
    let session = match state.registry.resolve_or_create(id, config).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "failed to establish session");
            return failure_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let Adapted {
        request,
        response,
        handle,
    } = adapt(Method::POST, headers, message);

    if let Err(e) = session.handle_request(request, response).await {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error!(session_id = %session.id(), error = %e, "request failed");
        return failure_response(status);
    }

    match handle.finish().await {
        Ok(finalized) => finalized.into_response(),
        Err(e) => {
            error!(session_id = %session.id(), error = %e, "response was not completed");
            failure_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Opens a streaming session. The first event names the POST path for it.
pub(super) async fn open_stream(State(state): State<AppState>) -> Response {
    let (session, events) = match state.registry.open_stream().await {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "failed to open event stream");
            return failure_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    info!(session_id = %session.id(), "event stream opened");

    let id_header = HeaderValue::from_str(session.id().as_str())
        .unwrap_or_else(|_| HeaderValue::from_static(""));
    let stream = events
        .take_until(state.shutdown.cancelled_owned())
        .map(|event| Ok::<_, Infallible>(Event::default().event(event.event).data(event.data)));

    (
        [
            (HeaderName::from_static(SESSION_ID_HEADER), id_header),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Sse::new(stream),
    )
        .into_response()
}

pub(super) async fn redirect_to_stream() -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, "/sse")])
}

/// Drops a session explicitly.
pub(super) async fn delete_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
) -> StatusCode {
    match session_id(query, &headers) {
        Some(id) if state.registry.remove(&id) => StatusCode::NO_CONTENT,
        Some(id) => {
            warn!(session_id = %id, "delete for unknown session");
            StatusCode::NOT_FOUND
        }
        None => StatusCode::NOT_FOUND,
    }
}
