//! Engine seam.
//!
//! An engine is a stream-oriented protocol processor. The bridge hands it
//! one end of an in-memory duplex pipe per session and speaks
//! newline-delimited JSON-RPC on the other end.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use super::overrides::ConfigOverride;
use super::session::SessionId;
use crate::error::BridgeError;

/// Engine side of a session's duplex connection.
#[derive(Debug)]
pub struct EngineIo {
    session_id: SessionId,
    stream: DuplexStream,
}

impl EngineIo {
    pub(crate) const fn new(session_id: SessionId, stream: DuplexStream) -> Self {
        Self { session_id, stream }
    }

    /// Session this connection belongs to.
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Unwraps the duplex stream.
    pub fn into_stream(self) -> DuplexStream {
        self.stream
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) {
        tokio::io::split(self.stream)
    }
}

/// A protocol engine the bridge can attach sessions to.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Starts serving `io`.
    ///
    /// Called exactly once per session. Implementations should spawn their
    /// message loop and return once the connection is accepted; the loop
    /// ends when the bridge closes its side.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::EngineConnect`] if the engine cannot accept
    /// the connection.
    async fn connect(&self, io: EngineIo) -> Result<(), BridgeError>;
}

/// Builds session-scoped engines from a configuration override.
pub trait EngineFactory: Send + Sync {
    /// Constructs a new, independently configured engine.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigOverride`] when the override cannot
    /// produce an engine.
    fn build(&self, config: &ConfigOverride) -> Result<Arc<dyn Engine>, BridgeError>;
}
