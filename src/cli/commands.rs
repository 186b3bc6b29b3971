//! Command execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::cli::parser::{Cli, Commands};
use crate::config::ServerConfig;
use crate::mcp::{BucketMcpServer, serve_http, serve_stdio};
use crate::storage::S3Store;

/// Executes the parsed command line.
///
/// Builds a multi-threaded runtime and blocks until the server stops.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the runtime cannot be
/// created, or the server fails.
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    let store = cli.store_config();
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;

    match &cli.command {
        Commands::Http {
            host,
            port,
            cors_origin,
            session_idle_secs,
            sweep_secs,
        } => {
            let mut builder = ServerConfig::builder();
            if let Some(host) = host {
                builder = builder.host(host.clone());
            }
            if let Some(port) = port {
                builder = builder.port(*port);
            }
            if let Some(origins) = cors_origin {
                builder = builder.allow_origins(origins.clone());
            }
            if let Some(secs) = session_idle_secs {
                builder = builder.session_idle_timeout(Duration::from_secs(*secs));
            }
            if let Some(secs) = sweep_secs {
                builder = builder.sweep_interval(Duration::from_secs(*secs));
            }
            let config = builder
                .from_env()
                .context("invalid server configuration")?
                .build();

            info!(
                region = %store.region,
                buckets = store.buckets.len(),
                max_buckets = store.max_buckets,
                "starting HTTP transport"
            );
            runtime
                .block_on(serve_http(store, config))
                .context("MCP server error")
        }
        Commands::Stdio => runtime
            .block_on(async {
                let server = BucketMcpServer::new(Arc::new(S3Store::new(&store)));
                serve_stdio(server).await
            })
            .context("MCP server error"),
    }
}
