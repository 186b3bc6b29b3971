//! Session transport: the bridge side of a session's duplex connection.
//!
//! Each transport owns one in-memory duplex pipe. Messages from HTTP calls
//! are written to the engine as JSON lines through a single ordered writer
//! task; a reader task routes every line the engine writes back either to
//! the call waiting for that reply or to the session's event sink.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use super::SESSION_ID_HEADER;
use super::adapter::{AdaptedRequest, AdaptedResponse};
use super::engine::EngineIo;
use super::session::SessionId;
use super::stream::EventSink;
use crate::error::BridgeError;

/// Buffer size of the in-memory duplex pipe, per direction.
const DUPLEX_CAPACITY: usize = 64 * 1024;

/// JSON-RPC "Invalid Request" error code.
const INVALID_REQUEST: i64 = -32600;

/// How engine replies reach the client.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Replies are returned in the body of the HTTP call that caused them.
    Buffered,
    /// Replies are pushed onto a long-lived event stream; calls get 202.
    Streaming(EventSink),
}

/// Callers waiting for engine replies, keyed by JSON-RPC id.
#[derive(Default)]
struct Pending {
    waiters: HashMap<String, oneshot::Sender<Value>>,
    closed: bool,
}

/// Reply position of one request within a call.
enum Slot {
    Waiting(oneshot::Receiver<Value>),
    Rejected(Value),
}

/// Routing state shared with the reader task.
struct Routing {
    session_id: SessionId,
    pending: Mutex<Pending>,
    events: Option<EventSink>,
}

impl Routing {
    fn route(&self, message: Value) {
        if let Some(key) = response_key(&message)
            && let Some(waiter) = self.pending.lock().waiters.remove(&key)
        {
            // A caller that hung up no longer needs its reply.
            let _ = waiter.send(message);
            return;
        }

        match &self.events {
            Some(sink) => {
                if sink.send_message(&message).is_err() {
                    debug!(session_id = %self.session_id, "event stream closed, dropping engine message");
                }
            }
            None => {
                debug!(session_id = %self.session_id, "no channel for unsolicited engine message");
            }
        }
    }
}

/// The bridge side of one session's duplex connection.
pub struct SessionTransport {
    routing: Arc<Routing>,
    outbound: mpsc::UnboundedSender<String>,
    engine_io: Mutex<Option<EngineIo>>,
}

impl SessionTransport {
    /// Creates the duplex pipe and starts the reader and writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(session_id: SessionId, delivery: Delivery) -> Self {
        let (engine_side, bridge_side) = tokio::io::duplex(DUPLEX_CAPACITY);
        let (reader, writer) = tokio::io::split(bridge_side);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let routing = Arc::new(Routing {
            session_id: session_id.clone(),
            pending: Mutex::new(Pending::default()),
            events: match delivery {
                Delivery::Buffered => None,
                Delivery::Streaming(sink) => Some(sink),
            },
        });

        tokio::spawn(write_to_engine(outbound_rx, writer, session_id.clone()));
        tokio::spawn(read_from_engine(reader, Arc::clone(&routing)));

        Self {
            routing,
            outbound,
            engine_io: Mutex::new(Some(EngineIo::new(session_id, engine_side))),
        }
    }

    /// Session this transport belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.routing.session_id
    }

    /// Whether replies travel on an event stream.
    pub fn is_streaming(&self) -> bool {
        self.routing.events.is_some()
    }

    /// Whether this is a streaming transport whose client has gone away.
    pub fn is_stream_closed(&self) -> bool {
        self.routing.events.as_ref().is_some_and(EventSink::is_closed)
    }

    /// Takes the engine side of the connection.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportAlreadyStarted`] on every call after
    /// the first.
    pub fn take_engine_io(&self) -> Result<EngineIo, BridgeError> {
        self.engine_io
            .lock()
            .take()
            .ok_or_else(|| BridgeError::TransportAlreadyStarted {
                session_id: self.session_id().to_string(),
            })
    }

    /// Feeds one adapted call to the engine and fills `response`.
    ///
    /// Buffered sessions answer with the engine's reply (an array for batch
    /// calls) or 202 when the call carried no requests. A request whose id is
    /// already awaiting a reply is not forwarded: alone it gets 400, inside a
    /// batch its slot holds a `-32600` error. Streaming sessions always answer
    /// 202; replies go to the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineClosed`] if the engine went away before
    /// replying.
    pub async fn handle_request(
        &self,
        request: AdaptedRequest,
        response: AdaptedResponse,
    ) -> Result<(), BridgeError> {
        let (messages, batch) = match request.into_body() {
            Value::Array(items) => (items, true),
            other => (vec![other], false),
        };

        if messages.is_empty() || messages.iter().any(|m| !m.is_object()) {
            let error = json!({
                "jsonrpc": "2.0",
                "error": { "code": INVALID_REQUEST, "message": "Invalid Request" },
                "id": null,
            });
            return self.reply(response, StatusCode::BAD_REQUEST, Some(&error));
        }

        if self.is_streaming() {
            for message in &messages {
                self.send(message)?;
            }
            return self.reply(response, StatusCode::ACCEPTED, None);
        }

        // An id already awaiting a reply on this session, including one
        // earlier in the same batch, is rejected rather than re-registered.
        let mut keys = Vec::new();
        let mut forward = Vec::with_capacity(messages.len());
        let mut slots = Vec::new();
        {
            let mut pending = self.routing.pending.lock();
            if pending.closed {
                return Err(self.closed_error());
            }
            for message in &messages {
                let Some(key) = request_key(message) else {
                    forward.push(message);
                    continue;
                };
                match pending.waiters.entry(key) {
                    Entry::Occupied(entry) => {
                        debug!(session_id = %self.session_id(), id = %entry.key(), "rejecting duplicate request id");
                        slots.push(Slot::Rejected(duplicate_id_error(message)));
                    }
                    Entry::Vacant(entry) => {
                        let (tx, rx) = oneshot::channel();
                        keys.push(entry.key().clone());
                        entry.insert(tx);
                        forward.push(message);
                        slots.push(Slot::Waiting(rx));
                    }
                }
            }
        }

        if !batch && let Some(Slot::Rejected(error)) = slots.first() {
            return self.reply(response, StatusCode::BAD_REQUEST, Some(error));
        }

        for message in forward {
            if let Err(e) = self.send(message) {
                let mut pending = self.routing.pending.lock();
                for key in &keys {
                    pending.waiters.remove(key);
                }
                return Err(e);
            }
        }

        if slots.is_empty() {
            return self.reply(response, StatusCode::ACCEPTED, None);
        }

        let mut replies = Vec::with_capacity(slots.len());
        for slot in slots {
            let reply = match slot {
                Slot::Waiting(waiter) => waiter.await.map_err(|_| self.closed_error())?,
                Slot::Rejected(error) => error,
            };
            replies.push(reply);
        }

        let body = if batch {
            Value::Array(replies)
        } else {
            replies.into_iter().next().unwrap_or(Value::Null)
        };
        self.reply(response, StatusCode::OK, Some(&body))
    }

    fn send(&self, message: &Value) -> Result<(), BridgeError> {
        let mut line = message.to_string();
        line.push('\n');
        self.outbound.send(line).map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> BridgeError {
        BridgeError::EngineClosed {
            session_id: self.session_id().to_string(),
        }
    }

    fn reply(
        &self,
        mut response: AdaptedResponse,
        status: StatusCode,
        body: Option<&Value>,
    ) -> Result<(), BridgeError> {
        response.set_status(status)?;
        if let Ok(value) = HeaderValue::from_str(self.session_id().as_str()) {
            response.set_header(HeaderName::from_static(SESSION_ID_HEADER), value)?;
        }
        if let Some(body) = body {
            response.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))?;
            response.write(body.to_string());
        }
        response.end();
        Ok(())
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("session_id", &self.routing.session_id)
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

/// Key of a client request awaiting a reply: has both `method` and `id`.
fn request_key(message: &Value) -> Option<String> {
    let id = message.get("id").filter(|id| !id.is_null())?;
    message.get("method")?;
    Some(id.to_string())
}

/// `Invalid Request` reply for a request whose id is already in flight.
fn duplicate_id_error(message: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": INVALID_REQUEST, "message": "Request id already in flight on this session" },
        "id": message.get("id").cloned().unwrap_or(Value::Null),
    })
}

/// Key of an engine reply: has `id` and `result` or `error`, no `method`.
fn response_key(message: &Value) -> Option<String> {
    if message.get("method").is_some() {
        return None;
    }
    if message.get("result").is_none() && message.get("error").is_none() {
        return None;
    }
    message
        .get("id")
        .filter(|id| !id.is_null())
        .map(ToString::to_string)
}

async fn write_to_engine(
    mut lines: mpsc::UnboundedReceiver<String>,
    mut writer: WriteHalf<DuplexStream>,
    session_id: SessionId,
) {
    while let Some(line) = lines.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!(%session_id, error = %e, "engine input closed");
            return;
        }
    }
    let _ = writer.shutdown().await;
    trace!(%session_id, "transport writer finished");
}

async fn read_from_engine(reader: ReadHalf<DuplexStream>, routing: Arc<Routing>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                Ok(message) => routing.route(message),
                Err(e) => {
                    warn!(session_id = %routing.session_id, error = %e, "engine wrote invalid JSON");
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(session_id = %routing.session_id, error = %e, "engine output failed");
                break;
            }
        }
    }

    // Dropping the senders fails every caller still waiting on this engine.
    {
        let mut pending = routing.pending.lock();
        pending.closed = true;
        pending.waiters.clear();
    }
    debug!(session_id = %routing.session_id, "engine output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::adapter::{Adapted, adapt};
    use crate::bridge::stream::open_stream;
    use axum::http::header::ACCEPT;
    use axum::http::{HeaderMap, Method};
    use futures_util::StreamExt;

    /// Answers every request with `{"echo": <method>}` until the bridge closes.
    fn spawn_echo_engine(io: EngineIo) {
        tokio::spawn(async move {
            let (reader, mut writer) = io.into_split();
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let message: Value = serde_json::from_str(&line).unwrap_or(Value::Null);
                if let (Some(id), Some(method)) = (message.get("id"), message.get("method")) {
                    let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"echo": method}});
                    let mut out = reply.to_string();
                    out.push('\n');
                    if writer.write_all(out.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    async fn call(transport: &SessionTransport, body: Value) -> (StatusCode, HeaderMap, Value) {
        let Adapted {
            request,
            response,
            handle,
        } = adapt(Method::POST, HeaderMap::new(), body);
        transport
            .handle_request(request, response)
            .await
            .unwrap_or_else(|e| panic!("handle_request failed: {e}"));
        let finalized = handle
            .finish()
            .await
            .unwrap_or_else(|e| panic!("finish failed: {e}"));
        let body = if finalized.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&finalized.body).unwrap_or_else(|e| panic!("bad body: {e}"))
        };
        (finalized.status, finalized.headers, body)
    }

    fn buffered(id: &str) -> SessionTransport {
        let transport = SessionTransport::new(SessionId::from(id), Delivery::Buffered);
        spawn_echo_engine(
            transport
                .take_engine_io()
                .unwrap_or_else(|e| panic!("take failed: {e}")),
        );
        transport
    }

    #[tokio::test]
    async fn test_engine_io_can_be_taken_once() {
        let transport = SessionTransport::new(SessionId::from("once"), Delivery::Buffered);
        assert!(transport.take_engine_io().is_ok());
        assert!(matches!(
            transport.take_engine_io(),
            Err(BridgeError::TransportAlreadyStarted { session_id }) if session_id == "once"
        ));
    }

    #[tokio::test]
    async fn test_request_gets_buffered_reply() {
        let transport = buffered("s1");
        let (status, headers, body) =
            call(&transport, json!({"jsonrpc": "2.0", "id": 7, "method": "ping"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[SESSION_ID_HEADER], "s1");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(body["id"], 7);
        assert_eq!(body["result"]["echo"], "ping");
    }

    #[tokio::test]
    async fn test_batch_replies_preserve_request_order() {
        let transport = buffered("batch");
        let (status, _, body) = call(
            &transport,
            json!([
                {"jsonrpc": "2.0", "id": "a", "method": "first"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": "b", "method": "second"},
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let replies = body.as_array().unwrap_or_else(|| unreachable!());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["echo"], "first");
        assert_eq!(replies[1]["result"]["echo"], "second");
    }

    #[tokio::test]
    async fn test_narrow_client_accept_header_still_gets_reply() {
        let transport = buffered("accept");
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));
        let Adapted {
            request,
            response,
            handle,
        } = adapt(
            Method::POST,
            headers,
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        );
        transport
            .handle_request(request, response)
            .await
            .unwrap_or_else(|e| panic!("handle_request failed: {e}"));
        let finalized = handle
            .finish()
            .await
            .unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(finalized.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_notification_only_call_is_accepted() {
        let transport = buffered("notify");
        let (status, _, body) = call(
            &transport,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_messages_are_rejected() {
        let transport = buffered("invalid");
        let (status, _, body) = call(&transport, json!([])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], INVALID_REQUEST);

        let (status, _, _) = call(&transport, json!("ping")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_concurrent_calls_sharing_an_id_keep_their_own_replies() {
        let transport = buffered("dup");
        let ((status_a, _, body_a), (status_b, _, body_b)) = tokio::join!(
            call(&transport, json!({"jsonrpc": "2.0", "id": 1, "method": "alpha"})),
            call(&transport, json!({"jsonrpc": "2.0", "id": 1, "method": "beta"})),
        );

        assert_eq!(status_a, StatusCode::OK);
        assert_eq!(body_a["result"]["echo"], "alpha");
        assert_eq!(status_b, StatusCode::BAD_REQUEST);
        assert_eq!(body_b["id"], 1);
        assert_eq!(body_b["error"]["code"], INVALID_REQUEST);

        // The id is free again once its reply has been delivered.
        let (status, _, body) =
            call(&transport, json!({"jsonrpc": "2.0", "id": 1, "method": "gamma"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["echo"], "gamma");
    }

    #[tokio::test]
    async fn test_repeated_id_inside_batch_is_rejected_in_place() {
        let transport = buffered("dup-batch");
        let (status, _, body) = call(
            &transport,
            json!([
                {"jsonrpc": "2.0", "id": 1, "method": "alpha"},
                {"jsonrpc": "2.0", "id": 1, "method": "beta"},
                {"jsonrpc": "2.0", "id": 2, "method": "gamma"},
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let replies = body.as_array().unwrap_or_else(|| unreachable!());
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["result"]["echo"], "alpha");
        assert_eq!(replies[1]["id"], 1);
        assert_eq!(replies[1]["error"]["code"], INVALID_REQUEST);
        assert_eq!(replies[2]["result"]["echo"], "gamma");
    }

    #[tokio::test]
    async fn test_streaming_transport_pushes_replies_to_sink() {
        let (sink, mut events) = open_stream();
        let transport = SessionTransport::new(SessionId::from("sse"), Delivery::Streaming(sink));
        spawn_echo_engine(
            transport
                .take_engine_io()
                .unwrap_or_else(|e| panic!("take failed: {e}")),
        );

        let (status, _, _) =
            call(&transport, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let event = events.next().await.unwrap_or_else(|| unreachable!());
        let message: Value =
            serde_json::from_str(&event.data).unwrap_or_else(|e| panic!("bad data: {e}"));
        assert_eq!(message["result"]["echo"], "tools/list");
    }

    #[tokio::test]
    async fn test_closed_engine_fails_waiting_call() {
        let transport = SessionTransport::new(SessionId::from("gone"), Delivery::Buffered);
        drop(
            transport
                .take_engine_io()
                .unwrap_or_else(|e| panic!("take failed: {e}")),
        );

        let Adapted {
            request, response, ..
        } = adapt(
            Method::POST,
            HeaderMap::new(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}),
        );
        let result = transport.handle_request(request, response).await;
        assert!(matches!(result, Err(BridgeError::EngineClosed { .. })));
    }

    #[test]
    fn test_message_keys() {
        assert_eq!(
            request_key(&json!({"id": 1, "method": "ping"})),
            Some("1".to_string())
        );
        assert_eq!(request_key(&json!({"method": "notify"})), None);
        assert_eq!(request_key(&json!({"id": null, "method": "x"})), None);
        assert_eq!(
            response_key(&json!({"id": "1", "result": {}})),
            Some("\"1\"".to_string())
        );
        assert_eq!(response_key(&json!({"id": 1, "method": "sampling"})), None);
        assert_eq!(response_key(&json!({"id": 1})), None);
    }
}
