//! Error types for s3-mcp-rs.
//!
//! Each layer has its own error enum; [`Error`] aggregates them for callers
//! that cross layer boundaries (the CLI and the transport entry points).

use std::sync::Arc;

use thiserror::Error;

/// Convenience result alias using the top-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Session bridge failure.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Object storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O failure (binding sockets, stdio).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the HTTP ↔ engine session bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A configuration override could not be turned into an engine.
    #[error("invalid configuration override: {message}")]
    ConfigOverride {
        /// What was wrong with the override.
        message: String,
    },

    /// The engine refused or failed to attach to a session transport.
    #[error("engine failed to connect session {session_id}: {message}")]
    EngineConnect {
        /// Session being created.
        session_id: String,
        /// Engine-provided reason.
        message: String,
    },

    /// A transport's engine side was requested a second time.
    #[error("transport for session {session_id} is already started")]
    TransportAlreadyStarted {
        /// Session owning the transport.
        session_id: String,
    },

    /// The inbound call could not be adapted (malformed body).
    #[error("malformed request: {message}")]
    RequestAdaptation {
        /// Parse failure detail.
        message: String,
    },

    /// Unexpected failure while the engine handled a call.
    #[error("engine error: {message}")]
    Engine {
        /// Failure detail.
        message: String,
    },

    /// The engine closed its side of the session while a caller was waiting.
    #[error("engine closed session {session_id}")]
    EngineClosed {
        /// Session whose engine went away.
        session_id: String,
    },

    /// Status or headers were set after the body had started.
    #[error("response headers already sent")]
    HeadersSent,

    /// A response sink was dropped without being ended.
    #[error("response was dropped before it was ended")]
    ResponseAbandoned,

    /// Session creation failed; shared by every caller waiting on it.
    #[error("session creation failed: {0}")]
    SessionCreation(#[source] Arc<BridgeError>),
}

impl BridgeError {
    /// Returns `true` for failures caused by the caller's input rather than
    /// by the engine or the bridge.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::RequestAdaptation { .. })
    }
}

/// Errors raised by object storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The bucket is outside the configured allow-list.
    #[error("Bucket {bucket} is not in the allowed buckets list")]
    BucketNotAllowed {
        /// Rejected bucket name.
        bucket: String,
    },

    /// The backend request failed.
    #[error("{operation} failed: {message}")]
    Backend {
        /// Operation name (e.g. `"ListObjectsV2"`).
        operation: &'static str,
        /// Backend-provided detail.
        message: String,
    },

    /// Content supplied by the caller could not be decoded.
    #[error("invalid content: {message}")]
    InvalidContent {
        /// Decode failure detail.
        message: String,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A setting had a value that could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Setting name (environment variable or flag).
        name: &'static str,
        /// Offending value.
        value: String,
    },
}
