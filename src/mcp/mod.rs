//! MCP (Model Context Protocol) server for s3-mcp-rs.
//!
//! Exposes S3 bucket and object operations as MCP tools, served either over
//! stdio or through the session-multiplexing HTTP bridge.
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ POST /mcp, GET /sse          ↓ stdin/stdout
//! http::router → SessionRegistry   serve_stdio
//!   ↓ EngineIo (duplex, JSON lines)  │
//! McpEngine ─────────────────────────┘
//!   ↓
//! BucketMcpServer (list-buckets, list-objects, get-object, put-object)
//!   ↓
//! ObjectStore (S3Store)
//! ```

pub mod engine;
pub mod params;
pub mod server;
pub mod transport;

pub use engine::{McpEngine, StoreEngineFactory, merge_override};
pub use params::{ContentEncoding, GetObjectParams, ListObjectsParams, PutObjectParams};
pub use server::BucketMcpServer;
pub use transport::{serve_http, serve_stdio};
