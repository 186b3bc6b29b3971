//! Streaming delivery path.
//!
//! Bridges a push-based [`EventSink`] to an incrementally delivered
//! [`EventStream`] response body.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Event name announcing the follow-up POST path.
pub const ENDPOINT_EVENT: &str = "endpoint";
/// Event name carrying an engine message.
pub const MESSAGE_EVENT: &str = "message";

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Event name.
    pub event: &'static str,
    /// Event data (single line).
    pub data: String,
}

/// The receiving side of the stream is gone.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("event stream closed")]
pub struct StreamClosed;

/// Push side of a stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSink {
    /// Announces the path clients should POST follow-up messages to.
    pub fn send_endpoint(&self, path: &str) -> Result<(), StreamClosed> {
        self.send(StreamEvent {
            event: ENDPOINT_EVENT,
            data: path.to_string(),
        })
    }

    /// Pushes an engine message.
    pub fn send_message(&self, message: &Value) -> Result<(), StreamClosed> {
        self.send(StreamEvent {
            event: MESSAGE_EVENT,
            data: message.to_string(),
        })
    }

    /// Whether the body side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: StreamEvent) -> Result<(), StreamClosed> {
        self.tx.send(event).map_err(|_| StreamClosed)
    }
}

/// Body side of a stream: yields events as they are pushed.
///
/// Never completes on its own; it ends when every [`EventSink`] clone is
/// dropped or when the consumer stops polling it.
#[derive(Debug)]
pub struct EventStream {
    inner: UnboundedReceiverStream<StreamEvent>,
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Opens a new sink/stream pair.
pub fn open_stream() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSink { tx },
        EventStream {
            inner: UnboundedReceiverStream::new(rx),
        },
    )
}
