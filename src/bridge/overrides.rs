//! Per-session configuration overrides carried in request headers.

use axum::http::HeaderMap;

use crate::storage::split_bucket_list;

/// Region override header.
pub const REGION_HEADER: &str = "s3-region";
/// Endpoint override header.
pub const ENDPOINT_HEADER: &str = "s3-endpoint";
/// Access key id override header.
pub const ACCESS_KEY_ID_HEADER: &str = "s3-access-key-id";
/// Secret access key override header.
pub const SECRET_ACCESS_KEY_HEADER: &str = "s3-secret-access-key";
/// Comma-separated bucket allow-list override header.
pub const BUCKETS_HEADER: &str = "s3-buckets";
/// Path-style addressing override header (`"true"` enables).
pub const FORCE_PATH_STYLE_HEADER: &str = "s3-force-path-style";

/// All override headers, for CORS allow-lists.
pub const OVERRIDE_HEADERS: [&str; 6] = [
    REGION_HEADER,
    ENDPOINT_HEADER,
    ACCESS_KEY_ID_HEADER,
    SECRET_ACCESS_KEY_HEADER,
    BUCKETS_HEADER,
    FORCE_PATH_STYLE_HEADER,
];

/// Backend settings supplied by a client for a new session.
///
/// Immutable once extracted; engines are built from it, never patched with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    /// Region.
    pub region: Option<String>,
    /// Custom endpoint.
    pub endpoint: Option<String>,
    /// Access key id.
    pub access_key_id: Option<String>,
    /// Secret access key.
    pub secret_access_key: Option<String>,
    /// Bucket allow-list.
    pub buckets: Option<Vec<String>>,
    /// Path-style addressing.
    pub force_path_style: Option<bool>,
}

impl ConfigOverride {
    /// Extracts an override from headers.
    ///
    /// Returns `None` when no override header is present. Values are taken
    /// as-is; validation is left to whoever builds the engine.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        let config = Self {
            region: get(REGION_HEADER),
            endpoint: get(ENDPOINT_HEADER),
            access_key_id: get(ACCESS_KEY_ID_HEADER),
            secret_access_key: get(SECRET_ACCESS_KEY_HEADER),
            buckets: get(BUCKETS_HEADER).map(|v| split_bucket_list(&v)),
            force_path_style: get(FORCE_PATH_STYLE_HEADER).map(|v| v == "true"),
        };

        (config != Self::default()).then_some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use test_case::test_case;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes())
                .unwrap_or_else(|e| panic!("bad header name {name}: {e}"));
            map.insert(name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_no_override_headers_yields_none() {
        let map = headers(&[("content-type", "application/json")]);
        assert_eq!(ConfigOverride::from_headers(&map), None);
    }

    #[test]
    fn test_full_override_is_extracted() {
        let map = headers(&[
            ("S3-Region", "auto"),
            ("S3-Endpoint", "https://r2.example.com"),
            ("S3-Access-Key-Id", "ak"),
            ("S3-Secret-Access-Key", "sk"),
            ("S3-Buckets", "a, b,"),
            ("S3-Force-Path-Style", "true"),
        ]);
        let config = ConfigOverride::from_headers(&map).unwrap_or_else(|| unreachable!());

        assert_eq!(config.region.as_deref(), Some("auto"));
        assert_eq!(config.endpoint.as_deref(), Some("https://r2.example.com"));
        assert_eq!(config.access_key_id.as_deref(), Some("ak"));
        assert_eq!(config.secret_access_key.as_deref(), Some("sk"));
        assert_eq!(config.buckets, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(config.force_path_style, Some(true));
    }

    #[test_case("true", Some(true) ; "exact true")]
    #[test_case("TRUE", Some(false) ; "case sensitive")]
    #[test_case("1", Some(false) ; "numeric is not true")]
    fn test_force_path_style_parsing(value: &'static str, expected: Option<bool>) {
        let map = headers(&[("s3-force-path-style", value)]);
        let config = ConfigOverride::from_headers(&map).unwrap_or_else(|| unreachable!());
        assert_eq!(config.force_path_style, expected);
    }
}
