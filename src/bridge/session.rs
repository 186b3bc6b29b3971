//! Session identity and the bound transport/engine pair.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use super::adapter::{AdaptedRequest, AdaptedResponse};
use super::engine::Engine;
use super::transport::SessionTransport;
use crate::error::BridgeError;

/// Opaque session identifier, client-supplied or generated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle of a session id inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No entry for the id.
    Unregistered,
    /// Entry inserted; the engine has not finished connecting.
    Connecting,
    /// Engine connected; the session serves calls.
    Active,
}

/// A transport bound to the engine driving it.
///
/// Sessions are created and owned by the
/// [`SessionRegistry`](super::SessionRegistry) and handed out as
/// `Arc<Session>`.
pub struct Session {
    id: SessionId,
    transport: SessionTransport,
    engine: Arc<dyn Engine>,
    last_seen: Mutex<Instant>,
}

impl Session {
    pub(crate) fn new(id: SessionId, transport: SessionTransport, engine: Arc<dyn Engine>) -> Self {
        Self {
            id,
            transport,
            engine,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Session identifier.
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// The transport bound to this session.
    pub const fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    /// The engine serving this session.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Feeds one adapted call to the engine through the session transport.
    pub async fn handle_request(
        &self,
        request: AdaptedRequest,
        response: AdaptedResponse,
    ) -> Result<(), BridgeError> {
        self.touch();
        self.transport.handle_request(request, response).await
    }

    /// Records activity on the session.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("streaming", &self.transport.is_streaming())
            .finish_non_exhaustive()
    }
}
