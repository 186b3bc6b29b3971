//! # s3-mcp-rs
//!
//! MCP server for S3-compatible object storage.
//!
//! Tools (`list-buckets`, `list-objects`, `get-object`, `put-object`) are
//! served over stdio or over HTTP. The HTTP side multiplexes many clients,
//! each identified by a session id, onto protocol engines that expect one
//! persistent duplex connection per session:
//!
//! - [`bridge`]: session registry, per-session transports, request/response
//!   adapter, streaming delivery
//! - [`http`]: axum routes (`/mcp`, `/sse`, `/health`)
//! - [`mcp`]: the rmcp tool server and the engine that runs it on a session
//! - [`storage`]: the [`storage::ObjectStore`] seam and its S3 implementation
//!
//! ## Example
//!
//! ```no_run
//! use s3_mcp_rs::config::ServerConfig;
//! use s3_mcp_rs::storage::StoreConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = StoreConfig::from_env();
//! let server = ServerConfig::builder().port(8080).build();
//! s3_mcp_rs::mcp::serve_http(store, server).await
//! # }
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod storage;

pub use bridge::{Engine, EngineFactory, EngineIo, Session, SessionId, SessionRegistry};
pub use config::{CorsConfig, EvictionPolicy, ServerConfig};
pub use error::{BridgeError, ConfigError, Error, Result, StorageError};
pub use storage::{ObjectStore, S3Store, StoreConfig};
