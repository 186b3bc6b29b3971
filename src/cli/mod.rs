//! CLI layer for s3-mcp-rs.
//!
//! Provides the command-line interface using clap, with one command per
//! MCP transport.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::{Cli, Commands};
