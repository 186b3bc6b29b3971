//! MCP transport layer for stdio and HTTP.
//!
//! Provides functions to start the MCP server with different transports.

use std::sync::Arc;

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bridge::SessionRegistry;
use crate::config::{EvictionPolicy, ServerConfig};
use crate::http::{AppState, router};
use crate::storage::{S3Store, StoreConfig};

use super::engine::{McpEngine, StoreEngineFactory};
use super::server::BucketMcpServer;

/// Starts the MCP server with stdio transport.
///
/// The server reads JSON-RPC messages from stdin and writes responses to stdout.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime error.
pub async fn serve_stdio(server: BucketMcpServer) -> anyhow::Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Starts the session-multiplexing HTTP bridge.
///
/// Sessions without configuration override headers share one engine built
/// from `store`; sessions with overrides get their own. Runs until ctrl-c.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve_http(store: StoreConfig, config: ServerConfig) -> anyhow::Result<()> {
    let default_server = BucketMcpServer::new(Arc::new(S3Store::new(&store)));
    let registry = Arc::new(
        SessionRegistry::new(
            Arc::new(McpEngine::new(default_server)),
            Arc::new(StoreEngineFactory::new(store)),
        )
        .with_eviction(config.eviction),
    );

    let shutdown = CancellationToken::new();
    match config.eviction {
        EvictionPolicy::Never => {
            info!("session eviction disabled; sessions live until shutdown");
        }
        EvictionPolicy::IdleFor(idle) => {
            info!(idle_secs = idle.as_secs(), "evicting idle sessions");
            Arc::clone(&registry)
                .spawn_eviction_task(config.sweep_interval, shutdown.child_token());
        }
    }

    let app = router(
        AppState {
            registry: Arc::clone(&registry),
            shutdown: shutdown.clone(),
        },
        &config.cors,
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "S3 MCP server listening (POST /mcp, GET /sse, GET /health)");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            signal.cancel();
        })
        .await?;

    let closed = registry.disconnect_all();
    info!(sessions = closed, "server stopped");
    Ok(())
}
