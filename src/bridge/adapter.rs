//! Request/response adapter.
//!
//! Converts one inbound HTTP call into the request/response pair the
//! session transport works with, and collects everything written to the
//! response into a [`FinalizedResponse`].

use axum::body::Bytes;
use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::BridgeError;

/// Accept value presented to the engine side on every adapted request.
pub const ACCEPT_ALL_DELIVERY: &str = "application/json, text/event-stream";

/// Parses an inbound body as JSON.
///
/// # Errors
///
/// Returns [`BridgeError::RequestAdaptation`] for malformed bodies.
pub fn parse_body(bytes: &[u8]) -> Result<Value, BridgeError> {
    serde_json::from_slice(bytes).map_err(|e| BridgeError::RequestAdaptation {
        message: e.to_string(),
    })
}

/// One inbound call as seen by the transport.
#[derive(Debug)]
pub struct AdaptedRequest {
    method: Method,
    headers: HeaderMap,
    body: Value,
}

impl AdaptedRequest {
    /// HTTP method of the call.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// All headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the Accept header admits `mime`.
    pub fn accepts(&self, mime: &str) -> bool {
        self.header(ACCEPT.as_str()).is_some_and(|accept| {
            accept
                .split(',')
                .map(|part| part.split(';').next().unwrap_or_default().trim())
                .any(|part| part == mime || part == "*/*")
        })
    }

    /// Parsed JSON body.
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Consumes the request, returning the body.
    pub fn into_body(self) -> Value {
        self.body
    }
}

/// Response sink handed to the transport.
///
/// Status and headers may change until the first [`write`](Self::write);
/// [`end`](Self::end) consumes the sink and resolves the paired
/// [`ResponseHandle`].
#[derive(Debug)]
pub struct AdaptedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    body_started: bool,
    completion: oneshot::Sender<FinalizedResponse>,
}

impl AdaptedResponse {
    /// Current status.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HeadersSent`] once the body has started.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), BridgeError> {
        if self.body_started {
            return Err(BridgeError::HeadersSent);
        }
        self.status = status;
        Ok(())
    }

    /// Sets (replaces) a header.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HeadersSent`] once the body has started.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), BridgeError> {
        if self.body_started {
            return Err(BridgeError::HeadersSent);
        }
        self.headers.insert(name, value);
        Ok(())
    }

    /// Appends a body chunk.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.body_started = true;
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Finalizes the response.
    pub fn end(self) {
        let finalized = FinalizedResponse {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(self.body),
        };
        // The handle may already be gone if the client hung up.
        let _ = self.completion.send(finalized);
    }
}

/// A response the engine has finished writing.
#[derive(Debug, Clone)]
pub struct FinalizedResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers captured before the first write.
    pub headers: HeaderMap,
    /// Concatenated body chunks.
    pub body: Bytes,
}

impl IntoResponse for FinalizedResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// Resolves once the paired [`AdaptedResponse`] is ended.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<FinalizedResponse>,
}

impl ResponseHandle {
    /// Waits for the response to be ended.
    ///
    /// There is no timeout: a sink that is held but never ended keeps this
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ResponseAbandoned`] if the sink was dropped
    /// without being ended.
    pub async fn finish(self) -> Result<FinalizedResponse, BridgeError> {
        self.rx.await.map_err(|_| BridgeError::ResponseAbandoned)
    }
}

/// Output of [`adapt`].
#[derive(Debug)]
pub struct Adapted {
    /// Request view for the transport.
    pub request: AdaptedRequest,
    /// Sink the transport writes into.
    pub response: AdaptedResponse,
    /// Resolves with the finalized response.
    pub handle: ResponseHandle,
}

/// Adapts one inbound call.
///
/// The request always advertises [`ACCEPT_ALL_DELIVERY`] so the transport
/// may answer with either a buffered or a streamed reply.
pub fn adapt(method: Method, mut headers: HeaderMap, body: Value) -> Adapted {
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_ALL_DELIVERY));
    let (completion, rx) = oneshot::channel();

    Adapted {
        request: AdaptedRequest {
            method,
            headers,
            body,
        },
        response: AdaptedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            body_started: false,
            completion,
        },
        handle: ResponseHandle { rx },
    }
}
