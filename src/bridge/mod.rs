//! HTTP ↔ engine session bridge.
//!
//! Multiplexes client sessions arriving as one-shot HTTP calls onto a
//! stream-oriented protocol engine that expects a persistent duplex
//! connection per session.
//!
//! # Architecture
//!
//! ```text
//! POST /mcp ─┐                      ┌─ Session ───────────────────────┐
//!            ├─ SessionRegistry ───►│ SessionTransport ◄─duplex─► Engine
//! GET /sse ──┘   (lazy, single-     │   ├── pending replies (buffered) │
//!                 flight creation)  │   └── EventSink (streaming)      │
//!                                   └──────────────────────────────────┘
//! adapt(call) → AdaptedRequest + AdaptedResponse ─end()─► FinalizedResponse
//! ```
//!
//! The engine never sees axum types: it gets an [`EngineIo`] carrying
//! newline-delimited JSON-RPC, and the transport turns each call into
//! writes on that stream plus a finalized response.

pub mod adapter;
pub mod engine;
pub mod overrides;
pub mod registry;
pub mod session;
pub mod stream;
pub mod transport;

pub use adapter::{
    ACCEPT_ALL_DELIVERY, Adapted, AdaptedRequest, AdaptedResponse, FinalizedResponse,
    ResponseHandle, adapt, parse_body,
};
pub use engine::{Engine, EngineFactory, EngineIo};
pub use overrides::ConfigOverride;
pub use registry::SessionRegistry;
pub use session::{Session, SessionId, SessionState};
pub use stream::{EventSink, EventStream, StreamEvent, open_stream};
pub use transport::{Delivery, SessionTransport};

/// Header carrying the session id on requests and responses.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Alternate request header accepted for the session id.
pub const LEGACY_SESSION_ID_HEADER: &str = "x-mcp-session-id";

/// Follow-up path advertised to streaming clients.
pub fn endpoint_path(id: &SessionId) -> String {
    format!("/mcp?sessionId={id}")
}
