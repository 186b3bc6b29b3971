//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Default page size for `list-objects`.
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Parameters for the `list-objects` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListObjectsParams {
    /// Name of the S3 bucket.
    pub bucket: String,

    /// Prefix to filter objects (like a folder path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Maximum number of objects to return (default 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_keys: Option<i32>,
}

/// Parameters for the `get-object` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetObjectParams {
    /// Name of the S3 bucket.
    pub bucket: String,

    /// Key (path) of the object to retrieve.
    pub key: String,
}

/// How `put-object` content is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    /// Plain text, stored as UTF-8.
    #[default]
    Text,
    /// Base64-encoded binary data.
    Base64,
}

/// Parameters for the `put-object` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PutObjectParams {
    /// Name of the S3 bucket.
    pub bucket: String,

    /// Key (path) of the object to upload.
    pub key: String,

    /// Content of the object (text or base64-encoded binary).
    pub content: String,

    /// MIME type; auto-detected from the key extension when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Encoding of `content`: `"text"` or `"base64"`.
    #[serde(default)]
    pub encoding: ContentEncoding,
}

impl PutObjectParams {
    /// Decodes `content` into the bytes to upload.
    pub fn decode_content(&self) -> Result<Vec<u8>, StorageError> {
        match self.encoding {
            ContentEncoding::Text => Ok(self.content.clone().into_bytes()),
            ContentEncoding::Base64 => {
                STANDARD
                    .decode(self.content.trim())
                    .map_err(|e| StorageError::InvalidContent {
                        message: format!("content is not valid base64: {e}"),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_object_defaults_to_text() {
        let params: PutObjectParams = serde_json::from_value(json!({
            "bucket": "b",
            "key": "notes.txt",
            "content": "hello",
        }))
        .unwrap_or_else(|e| panic!("deserialize failed: {e}"));

        assert_eq!(params.encoding, ContentEncoding::Text);
        assert_eq!(params.content_type, None);
        assert_eq!(
            params.decode_content().unwrap_or_else(|e| panic!("{e}")),
            b"hello".to_vec()
        );
    }

    #[test]
    fn test_put_object_base64_content() {
        let params: PutObjectParams = serde_json::from_value(json!({
            "bucket": "b",
            "key": "blob.bin",
            "content": "AAEC/w==",
            "contentType": "application/octet-stream",
            "encoding": "base64",
        }))
        .unwrap_or_else(|e| panic!("deserialize failed: {e}"));

        assert_eq!(
            params.content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(
            params.decode_content().unwrap_or_else(|e| panic!("{e}")),
            vec![0, 1, 2, 255]
        );
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let params = PutObjectParams {
            bucket: "b".to_string(),
            key: "k".to_string(),
            content: "not base64!".to_string(),
            content_type: None,
            encoding: ContentEncoding::Base64,
        };
        assert!(matches!(
            params.decode_content(),
            Err(StorageError::InvalidContent { .. })
        ));
    }

    #[test]
    fn test_list_objects_uses_camel_case() {
        let params: ListObjectsParams =
            serde_json::from_value(json!({"bucket": "b", "maxKeys": 10}))
                .unwrap_or_else(|e| panic!("deserialize failed: {e}"));
        assert_eq!(params.max_keys, Some(10));
        assert_eq!(params.prefix, None);
    }
}
