//! MCP server implementation for s3-mcp-rs.
//!
//! Exposes bucket and object operations of an [`ObjectStore`] as MCP tools.
//! Storage failures are reported as tool results with `isError` set, so the
//! client sees the message instead of a protocol error.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use tracing::{debug, warn};

use crate::storage::{ObjectBody, ObjectStore, is_pdf_file};

use super::params::{DEFAULT_MAX_KEYS, GetObjectParams, ListObjectsParams, PutObjectParams};

/// Pretty-prints a tool payload.
fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))
}

/// Binary payload rendered as a base64 tool result.
fn binary_text(content_type: &str, bytes: &[u8], note: &str) -> String {
    format!(
        "Binary content ({content_type}, {} bytes). {note}base64-encoded below:\n{}",
        bytes.len(),
        STANDARD.encode(bytes)
    )
}

/// Extracts the text layer of a PDF off the async runtime.
///
/// Returns `None` for documents the parser rejects, including ones that make
/// it panic.
async fn extract_pdf_text(bytes: Vec<u8>) -> Option<String> {
    match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(error = %e, "PDF text extraction failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "PDF text extraction aborted");
            None
        }
    }
}

/// A failed tool call, visible to the client as text.
fn tool_error(message: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message)])
}

/// S3 MCP server.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct BucketMcpServer {
    tool_router: ToolRouter<Self>,
    store: Arc<dyn ObjectStore>,
}

#[tool_router]
impl BucketMcpServer {
    /// Lists buckets visible to the configured credentials.
    #[tool(
        name = "list-buckets",
        description = "List available S3 buckets. Only buckets in the configured allow-list are returned, up to the configured maximum."
    )]
    async fn list_buckets(&self) -> Result<CallToolResult, McpError> {
        match self.store.list_buckets().await {
            Ok(buckets) => Ok(CallToolResult::success(vec![Content::text(to_json(
                &buckets,
            )?)])),
            Err(e) => Ok(tool_error(format!("Error listing buckets: {e}"))),
        }
    }

    /// Lists objects under an optional prefix.
    #[tool(
        name = "list-objects",
        description = "List objects in an S3 bucket, optionally filtered by key prefix."
    )]
    async fn list_objects(
        &self,
        Parameters(params): Parameters<ListObjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        let prefix = params.prefix.unwrap_or_default();
        let max_keys = params.max_keys.unwrap_or(DEFAULT_MAX_KEYS);

        match self
            .store
            .list_objects(&params.bucket, &prefix, max_keys)
            .await
        {
            Ok(objects) => Ok(CallToolResult::success(vec![Content::text(to_json(
                &objects,
            )?)])),
            Err(e) => Ok(tool_error(format!(
                "Error listing objects in bucket {}: {e}",
                params.bucket
            ))),
        }
    }

    /// Fetches one object as text or base64.
    #[tool(
        name = "get-object",
        description = "Retrieve an object from an S3 bucket. Text objects are returned as text and PDFs as their extracted text; other binary objects are returned base64-encoded."
    )]
    async fn get_object(
        &self,
        Parameters(GetObjectParams { bucket, key }): Parameters<GetObjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = match self.store.get_object(&bucket, &key).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(tool_error(format!(
                    "Error getting object {key} from bucket {bucket}: {e}"
                )));
            }
        };

        let text = match data.body {
            ObjectBody::Text(text) => text,
            ObjectBody::Binary(bytes) if is_pdf_file(&key, Some(&data.content_type)) => {
                match extract_pdf_text(bytes.clone()).await {
                    Some(text) => text,
                    None => binary_text(
                        &data.content_type,
                        &bytes,
                        "PDF text could not be extracted; ",
                    ),
                }
            }
            ObjectBody::Binary(bytes) => binary_text(&data.content_type, &bytes, ""),
        };

        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Uploads one object.
    #[tool(
        name = "put-object",
        description = "Upload an object to an S3 bucket. Supports text and binary content with automatic content type detection."
    )]
    async fn put_object(
        &self,
        Parameters(params): Parameters<PutObjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let body = match params.decode_content() {
            Ok(body) => body,
            Err(e) => {
                return Ok(tool_error(format!(
                    "Error uploading object {} to bucket {}: {e}",
                    params.key, params.bucket
                )));
            }
        };

        debug!(bucket = %params.bucket, key = %params.key, bytes = body.len(), "uploading object");
        match self
            .store
            .put_object(
                &params.bucket,
                &params.key,
                body,
                params.content_type.as_deref(),
            )
            .await
        {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Successfully uploaded {} to bucket {}",
                params.key, params.bucket
            ))])),
            Err(e) => Ok(tool_error(format!(
                "Error uploading object {} to bucket {}: {e}",
                params.key, params.bucket
            ))),
        }
    }
}

#[tool_handler]
impl ServerHandler for BucketMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "s3-mcp-rs".to_string(),
                title: Some("S3 MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "S3 MCP server: browse buckets with `list-buckets` and `list-objects`, \
                 read objects with `get-object`, and upload with `put-object`."
                    .to_string(),
            ),
        }
    }
}

impl BucketMcpServer {
    /// Creates a server backed by `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use rmcp::model::RawContent;

    use crate::error::StorageError;
    use crate::storage::{BucketInfo, BucketScope, ObjectData, ObjectInfo};

    /// Store with one fixed bucket that records uploads.
    struct FixedStore {
        scope: BucketScope,
        uploads: parking_lot::Mutex<Vec<(String, Vec<u8>, Option<String>)>>,
    }

    impl FixedStore {
        fn new() -> Self {
            Self {
                scope: BucketScope::new(vec!["docs".to_string()], 5),
                uploads: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FixedStore {
        async fn list_buckets(&self) -> Result<Vec<BucketInfo>, StorageError> {
            Ok(self.scope.filter(vec![
                BucketInfo {
                    name: "docs".to_string(),
                    creation_date: None,
                },
                BucketInfo {
                    name: "private".to_string(),
                    creation_date: None,
                },
            ]))
        }

        async fn list_objects(
            &self,
            bucket: &str,
            prefix: &str,
            _max_keys: i32,
        ) -> Result<Vec<ObjectInfo>, StorageError> {
            self.scope.check(bucket)?;
            Ok(vec![ObjectInfo {
                key: format!("{prefix}readme.md"),
                size: Some(4),
                last_modified: None,
            }])
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData, StorageError> {
            self.scope.check(bucket)?;
            let bytes = if key.ends_with(".pdf") {
                b"%PDF".to_vec()
            } else {
                b"# hi".to_vec()
            };
            let content_type = if key.ends_with(".pdf") {
                "application/pdf"
            } else {
                "text/markdown"
            };
            Ok(ObjectData::classify(key, content_type.to_string(), bytes))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: Option<&str>,
        ) -> Result<(), StorageError> {
            self.scope.check(bucket)?;
            self.uploads
                .lock()
                .push((key.to_string(), body, content_type.map(ToString::to_string)));
            Ok(())
        }
    }

    fn text_of(result: &CallToolResult) -> String {
        match &result.content[0].raw {
            RawContent::Text(text) => text.text.clone(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_all_tools_registered() {
        let server = BucketMcpServer::new(Arc::new(FixedStore::new()));
        let mut names: Vec<_> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["get-object", "list-buckets", "list-objects", "put-object"]
        );
    }

    #[tokio::test]
    async fn test_list_buckets_returns_filtered_json() {
        let server = BucketMcpServer::new(Arc::new(FixedStore::new()));
        let result = server
            .list_buckets()
            .await
            .unwrap_or_else(|e| panic!("tool failed: {e:?}"));

        assert_ne!(result.is_error, Some(true));
        let buckets: serde_json::Value =
            serde_json::from_str(&text_of(&result)).unwrap_or_else(|e| panic!("bad json: {e}"));
        assert_eq!(buckets.as_array().map(Vec::len), Some(1));
        assert_eq!(buckets[0]["name"], "docs");
    }

    #[tokio::test]
    async fn test_disallowed_bucket_is_tool_error() {
        let server = BucketMcpServer::new(Arc::new(FixedStore::new()));
        let result = server
            .list_objects(Parameters(ListObjectsParams {
                bucket: "private".to_string(),
                prefix: None,
                max_keys: None,
            }))
            .await
            .unwrap_or_else(|e| panic!("tool failed: {e:?}"));

        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("Bucket private is not in the allowed buckets list"));
    }

    #[tokio::test]
    async fn test_get_object_text_and_pdf() {
        let server = BucketMcpServer::new(Arc::new(FixedStore::new()));
        let text = server
            .get_object(Parameters(GetObjectParams {
                bucket: "docs".to_string(),
                key: "readme.md".to_string(),
            }))
            .await
            .unwrap_or_else(|e| panic!("tool failed: {e:?}"));
        assert_eq!(text_of(&text), "# hi");

        let pdf = server
            .get_object(Parameters(GetObjectParams {
                bucket: "docs".to_string(),
                key: "report.pdf".to_string(),
            }))
            .await
            .unwrap_or_else(|e| panic!("tool failed: {e:?}"));
        let body = text_of(&pdf);
        assert!(body.contains("PDF text could not be extracted"));
        assert!(body.ends_with(&STANDARD.encode(b"%PDF")));
    }

    #[tokio::test]
    async fn test_put_object_decodes_base64() {
        let store = Arc::new(FixedStore::new());
        let server = BucketMcpServer::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
        let result = server
            .put_object(Parameters(PutObjectParams {
                bucket: "docs".to_string(),
                key: "blob.bin".to_string(),
                content: STANDARD.encode([1u8, 2, 3]),
                content_type: None,
                encoding: super::super::params::ContentEncoding::Base64,
            }))
            .await
            .unwrap_or_else(|e| panic!("tool failed: {e:?}"));

        assert_eq!(
            text_of(&result),
            "Successfully uploaded blob.bin to bucket docs"
        );
        let uploads = store.uploads.lock();
        assert_eq!(uploads[0], ("blob.bin".to_string(), vec![1, 2, 3], None));
    }
}
