//! S3 backend built on the official AWS SDK.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use tracing::{debug, warn};

use super::{
    BucketInfo, BucketScope, ObjectData, ObjectInfo, ObjectStore, StoreConfig,
    detect_content_type,
};
use crate::error::StorageError;

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "s3-mcp-rs";

/// [`ObjectStore`] backed by an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    scope: BucketScope,
}

impl S3Store {
    /// Builds a client from `config`.
    ///
    /// Static credentials are attached only when both the key id and the
    /// secret are present.
    pub fn new(config: &StoreConfig) -> Self {
        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER,
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        debug!(
            region = %config.region,
            endpoint = ?config.endpoint,
            allowed_buckets = config.buckets.len(),
            "created S3 client"
        );

        Self {
            client: Client::from_conf(builder.build()),
            scope: config.scope(),
        }
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> StorageError
where
    E: std::error::Error,
{
    let message = DisplayErrorContext(&err).to_string();
    warn!(operation, error = %message, "S3 request failed");
    StorageError::Backend { operation, message }
}

fn format_timestamp(ts: Option<&DateTime>) -> Option<String> {
    ts.and_then(|t| t.fmt(DateTimeFormat::DateTime).ok())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| backend_error("ListBuckets", e))?;

        let buckets = output
            .buckets()
            .iter()
            .filter_map(|b| {
                b.name().map(|name| BucketInfo {
                    name: name.to_string(),
                    creation_date: format_timestamp(b.creation_date()),
                })
            })
            .collect();

        Ok(self.scope.filter(buckets))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectInfo>, StorageError> {
        self.scope.check(bucket)?;

        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| backend_error("ListObjectsV2", e))?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|o| {
                o.key().map(|key| ObjectInfo {
                    key: key.to_string(),
                    size: o.size(),
                    last_modified: format_timestamp(o.last_modified()),
                })
            })
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, StorageError> {
        self.scope.check(bucket)?;

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("GetObject", e))?;

        let content_type = output
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| backend_error("GetObject", e))?
            .into_bytes();

        Ok(ObjectData::classify(key, content_type, bytes.to_vec()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.scope.check(bucket)?;

        let content_type = content_type.unwrap_or_else(|| detect_content_type(key));
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| backend_error("PutObject", e))?;

        debug!(bucket, key, content_type, "uploaded object");
        Ok(())
    }
}
