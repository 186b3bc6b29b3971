//! Object storage capability used by the MCP tools.
//!
//! The tools only see the narrow [`ObjectStore`] trait. [`S3Store`] is the
//! production implementation; tests substitute in-memory stores.

pub mod content;
pub mod s3;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;

pub use content::{detect_content_type, is_pdf_file, is_text_file};
pub use s3::S3Store;

/// Default AWS region when neither an override nor the environment sets one.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Default cap on the number of buckets returned by `list-buckets`.
pub const DEFAULT_MAX_BUCKETS: usize = 5;

/// A bucket visible to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation timestamp as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

/// Summary of one object in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// Last modification timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Object payload after text detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    /// UTF-8 text (lossy for invalid sequences).
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

/// A fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    /// Content type reported by the backend, or `application/octet-stream`.
    pub content_type: String,
    /// Payload.
    pub body: ObjectBody,
}

impl ObjectData {
    /// Classifies raw bytes as text or binary using the key and content type.
    pub fn classify(key: &str, content_type: String, bytes: Vec<u8>) -> Self {
        let body = if is_text_file(key, Some(&content_type)) {
            ObjectBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            ObjectBody::Binary(bytes)
        };
        Self { content_type, body }
    }
}

/// Read/list/write operations the MCP tools need from a storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists visible buckets, already filtered and capped.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError>;

    /// Lists objects in `bucket` whose keys start with `prefix`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectInfo>, StorageError>;

    /// Fetches one object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, StorageError>;

    /// Uploads one object. `content_type` falls back to extension detection.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;
}

/// Allow-list and cap applied to every bucket access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketScope {
    allowed: Vec<String>,
    max_buckets: usize,
}

impl BucketScope {
    /// Creates a scope. An empty allow-list permits every bucket.
    pub const fn new(allowed: Vec<String>, max_buckets: usize) -> Self {
        Self {
            allowed,
            max_buckets,
        }
    }

    /// Rejects buckets outside a non-empty allow-list.
    pub fn check(&self, bucket: &str) -> Result<(), StorageError> {
        if self.allowed.is_empty() || self.allowed.iter().any(|b| b == bucket) {
            Ok(())
        } else {
            Err(StorageError::BucketNotAllowed {
                bucket: bucket.to_string(),
            })
        }
    }

    /// Filters a backend listing down to allowed buckets and applies the cap.
    pub fn filter(&self, buckets: Vec<BucketInfo>) -> Vec<BucketInfo> {
        buckets
            .into_iter()
            .filter(|b| self.check(&b.name).is_ok())
            .take(self.max_buckets)
            .collect()
    }
}

/// Connection settings for the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// AWS region.
    pub region: String,
    /// Custom endpoint (MinIO, Cloudflare R2, ...).
    pub endpoint: Option<String>,
    /// Static access key id.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Allowed buckets; empty means all.
    pub buckets: Vec<String>,
    /// Maximum buckets returned by listings.
    pub max_buckets: usize,
    /// Use path-style addressing.
    pub force_path_style: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            buckets: Vec::new(),
            max_buckets: DEFAULT_MAX_BUCKETS,
            force_path_style: false,
        }
    }
}

impl StoreConfig {
    /// Creates a new builder for `StoreConfig`.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::builder().from_env().build()
    }

    /// Scope derived from the allow-list and cap.
    pub fn scope(&self) -> BucketScope {
        BucketScope::new(self.buckets.clone(), self.max_buckets)
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    region: Option<String>,
    endpoint: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    buckets: Option<Vec<String>>,
    max_buckets: Option<usize>,
    force_path_style: Option<bool>,
}

impl StoreConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.region.is_none() {
            self.region = std::env::var("AWS_REGION").ok();
        }
        if self.endpoint.is_none() {
            self.endpoint = std::env::var("AWS_ENDPOINT").ok();
        }
        if self.access_key_id.is_none() {
            self.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        }
        if self.secret_access_key.is_none() {
            self.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        }
        if self.buckets.is_none() {
            self.buckets = std::env::var("S3_BUCKETS")
                .ok()
                .map(|v| split_bucket_list(&v));
        }
        if self.max_buckets.is_none() {
            self.max_buckets = std::env::var("S3_MAX_BUCKETS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.force_path_style.is_none() {
            self.force_path_style = std::env::var("AWS_S3_FORCE_PATH_STYLE")
                .ok()
                .map(|v| v == "true");
        }
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets static credentials.
    #[must_use]
    pub fn credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets the bucket allow-list.
    #[must_use]
    pub fn buckets(mut self, buckets: Vec<String>) -> Self {
        self.buckets = Some(buckets);
        self
    }

    /// Sets the bucket listing cap.
    #[must_use]
    pub const fn max_buckets(mut self, n: usize) -> Self {
        self.max_buckets = Some(n);
        self
    }

    /// Enables or disables path-style addressing.
    #[must_use]
    pub const fn force_path_style(mut self, enabled: bool) -> Self {
        self.force_path_style = Some(enabled);
        self
    }

    /// Builds the [`StoreConfig`].
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: self.endpoint,
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            buckets: self.buckets.unwrap_or_default(),
            max_buckets: self.max_buckets.unwrap_or(DEFAULT_MAX_BUCKETS),
            force_path_style: self.force_path_style.unwrap_or(false),
        }
    }
}

/// Splits a comma-separated bucket list, trimming and dropping empty entries.
pub fn split_bucket_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(ToString::to_string)
        .collect()
}
