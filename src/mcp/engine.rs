//! rmcp-backed engines for the session bridge.
//!
//! [`McpEngine`] runs an rmcp [`ServerHandler`] over a session's duplex
//! connection. [`StoreEngineFactory`] builds one per configuration override,
//! each with its own S3 client.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::service::{RunningService, serve_directly};
use rmcp::{RoleServer, ServerHandler};
use tracing::{debug, warn};

use crate::bridge::{ConfigOverride, Engine, EngineFactory, EngineIo};
use crate::error::BridgeError;
use crate::storage::{S3Store, StoreConfig};

use super::server::BucketMcpServer;

/// Serves an rmcp handler on each connected session.
///
/// Sessions are served directly, without waiting for an `initialize`
/// handshake, so clients may call `ping` or `tools/list` first.
#[derive(Clone)]
pub struct McpEngine<S> {
    handler: S,
}

impl<S> McpEngine<S> {
    /// Wraps `handler`; each session gets a clone of it.
    pub const fn new(handler: S) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<S> Engine for McpEngine<S>
where
    S: ServerHandler + Clone,
{
    async fn connect(&self, io: EngineIo) -> Result<(), BridgeError> {
        let session_id = io.session_id().clone();
        let running: RunningService<RoleServer, S> =
            serve_directly(self.handler.clone(), io.into_split(), None);

        tokio::spawn(async move {
            match running.waiting().await {
                Ok(reason) => debug!(%session_id, ?reason, "mcp session ended"),
                Err(e) => warn!(%session_id, error = %e, "mcp session task failed"),
            }
        });
        Ok(())
    }
}

/// Builds a [`BucketMcpServer`] engine per configuration override.
#[derive(Debug, Clone)]
pub struct StoreEngineFactory {
    base: StoreConfig,
}

impl StoreEngineFactory {
    /// Overrides are merged onto `base`.
    pub const fn new(base: StoreConfig) -> Self {
        Self { base }
    }
}

impl EngineFactory for StoreEngineFactory {
    fn build(&self, config: &ConfigOverride) -> Result<Arc<dyn Engine>, BridgeError> {
        let merged = merge_override(&self.base, config)?;
        let store = S3Store::new(&merged);
        Ok(Arc::new(McpEngine::new(BucketMcpServer::new(Arc::new(
            store,
        )))))
    }
}

/// Applies `config` on top of `base`.
///
/// Unset override fields keep the base value; a bucket list in the override
/// replaces the base allow-list.
///
/// # Errors
///
/// Returns [`BridgeError::ConfigOverride`] when only one half of a
/// credential pair is supplied.
pub fn merge_override(
    base: &StoreConfig,
    config: &ConfigOverride,
) -> Result<StoreConfig, BridgeError> {
    let (access_key_id, secret_access_key) =
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => (Some(id.clone()), Some(secret.clone())),
            (None, None) => (base.access_key_id.clone(), base.secret_access_key.clone()),
            _ => {
                return Err(BridgeError::ConfigOverride {
                    message: "access key id and secret access key must be supplied together"
                        .to_string(),
                });
            }
        };

    Ok(StoreConfig {
        region: config.region.clone().unwrap_or_else(|| base.region.clone()),
        endpoint: config.endpoint.clone().or_else(|| base.endpoint.clone()),
        access_key_id,
        secret_access_key,
        buckets: config.buckets.clone().unwrap_or_else(|| base.buckets.clone()),
        max_buckets: base.max_buckets,
        force_path_style: config.force_path_style.unwrap_or(base.force_path_style),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StoreConfig {
        StoreConfig::builder()
            .region("us-east-1")
            .credentials("base-ak", "base-sk")
            .buckets(vec!["shared".to_string()])
            .max_buckets(3)
            .build()
    }

    #[test]
    fn test_unset_fields_keep_base_values() {
        let merged = merge_override(
            &base(),
            &ConfigOverride {
                region: Some("eu-central-1".to_string()),
                ..ConfigOverride::default()
            },
        )
        .unwrap_or_else(|e| panic!("merge failed: {e}"));

        assert_eq!(merged.region, "eu-central-1");
        assert_eq!(merged.access_key_id.as_deref(), Some("base-ak"));
        assert_eq!(merged.buckets, vec!["shared".to_string()]);
        assert_eq!(merged.max_buckets, 3);
        assert!(!merged.force_path_style);
    }

    #[test]
    fn test_override_replaces_credentials_and_buckets() {
        let merged = merge_override(
            &base(),
            &ConfigOverride {
                endpoint: Some("http://minio:9000".to_string()),
                access_key_id: Some("ak".to_string()),
                secret_access_key: Some("sk".to_string()),
                buckets: Some(vec!["tenant".to_string()]),
                force_path_style: Some(true),
                ..ConfigOverride::default()
            },
        )
        .unwrap_or_else(|e| panic!("merge failed: {e}"));

        assert_eq!(merged.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(merged.secret_access_key.as_deref(), Some("sk"));
        assert_eq!(merged.buckets, vec!["tenant".to_string()]);
        assert!(merged.force_path_style);
    }

    #[test]
    fn test_half_credentials_are_rejected() {
        let err = merge_override(
            &base(),
            &ConfigOverride {
                access_key_id: Some("ak".to_string()),
                ..ConfigOverride::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::ConfigOverride { .. }));
    }
}
