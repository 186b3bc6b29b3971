//! HTTP server configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::bridge::overrides::OVERRIDE_HEADERS;
use crate::error::ConfigError;

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";
/// Default HTTP port.
const DEFAULT_PORT: u16 = 3000;
/// Default interval between eviction sweeps.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// When sessions are dropped from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Sessions live until reset or shutdown.
    #[default]
    Never,
    /// Sessions idle for longer than the duration are dropped, as are
    /// streaming sessions whose client disconnected.
    IdleFor(Duration),
}

/// CORS settings for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allow_origins: Vec<String>,
    /// Allowed methods.
    pub allow_methods: Vec<String>,
    /// Allowed request headers.
    pub allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let mut allow_headers: Vec<String> = [
            "content-type",
            "authorization",
            "accept",
            "x-mcp-session-id",
            "mcp-session-id",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        allow_headers.extend(OVERRIDE_HEADERS.iter().map(ToString::to_string));

        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "POST", "DELETE", "OPTIONS"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            allow_headers,
        }
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// CORS settings.
    pub cors: CorsConfig,
    /// Session eviction policy.
    pub eviction: EvictionPolicy,
    /// Interval between eviction sweeps.
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Creates a new builder for `ServerConfig`.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::builder().from_env()?.build())
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    cors: Option<CorsConfig>,
    allow_origins: Option<Vec<String>>,
    session_idle_timeout: Option<Duration>,
    sweep_interval: Option<Duration>,
}

fn parse_env<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    std::env::var(name)
        .ok()
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

impl ServerConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if self.host.is_none() {
            self.host = std::env::var("S3_MCP_HOST").ok();
        }
        if self.port.is_none() {
            self.port = parse_env("S3_MCP_PORT")?;
        }
        if self.allow_origins.is_none() {
            self.allow_origins = std::env::var("S3_MCP_CORS_ORIGIN")
                .ok()
                .map(|v| v.split(',').map(|o| o.trim().to_string()).collect());
        }
        if self.session_idle_timeout.is_none() {
            self.session_idle_timeout =
                parse_env::<u64>("S3_MCP_SESSION_IDLE_SECS")?.map(Duration::from_secs);
        }
        Ok(self)
    }

    /// Sets the bind host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Replaces the whole CORS configuration.
    #[must_use]
    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Sets the allowed CORS origins, keeping default methods and headers.
    #[must_use]
    pub fn allow_origins(mut self, origins: Vec<String>) -> Self {
        self.allow_origins = Some(origins);
        self
    }

    /// Evicts sessions idle for longer than `timeout`.
    #[must_use]
    pub const fn session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = Some(timeout);
        self
    }

    /// Sets the interval between eviction sweeps.
    #[must_use]
    pub const fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Builds the [`ServerConfig`].
    pub fn build(self) -> ServerConfig {
        let mut cors = self.cors.unwrap_or_default();
        if let Some(origins) = self.allow_origins {
            cors.allow_origins = origins;
        }

        ServerConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            cors,
            eviction: self
                .session_idle_timeout
                .map_or(EvictionPolicy::Never, EvictionPolicy::IdleFor),
            sweep_interval: self
                .sweep_interval
                .unwrap_or(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
        }
    }
}
