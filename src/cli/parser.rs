//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};

use crate::storage::StoreConfig;

/// S3-MCP-RS: MCP server for S3-compatible object storage.
///
/// Serves bucket and object tools over stdio, or over HTTP with one MCP
/// session per client.
#[derive(Parser, Debug)]
#[command(name = "s3-mcp-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log filter (e.g. `info`, `s3_mcp_rs=debug`). `RUST_LOG` takes precedence.
    #[arg(long, env = "S3_MCP_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// AWS region. Falls back to `AWS_REGION`, then `us-east-1`.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Custom S3 endpoint (MinIO, R2, ...). Falls back to `AWS_ENDPOINT`.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Comma-separated bucket allow-list. Falls back to `S3_BUCKETS`.
    #[arg(long, value_delimiter = ',', global = true)]
    pub buckets: Option<Vec<String>>,

    /// Maximum buckets returned by `list-buckets`. Falls back to `S3_MAX_BUCKETS`.
    #[arg(long, global = true)]
    pub max_buckets: Option<usize>,

    /// Use path-style bucket addressing.
    #[arg(long, global = true)]
    pub force_path_style: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Storage settings: flags first, then environment, then defaults.
    pub fn store_config(&self) -> StoreConfig {
        let mut builder = StoreConfig::builder();
        if let Some(region) = &self.region {
            builder = builder.region(region.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint.clone());
        }
        if let Some(buckets) = &self.buckets {
            builder = builder.buckets(
                buckets
                    .iter()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect(),
            );
        }
        if let Some(max) = self.max_buckets {
            builder = builder.max_buckets(max);
        }
        if self.force_path_style {
            builder = builder.force_path_style(true);
        }
        builder.from_env().build()
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve MCP over HTTP, one session per client.
    ///
    /// `POST /mcp` carries JSON-RPC calls; `GET /sse` opens a streaming
    /// session. Clients may send `S3-*` headers to get a session with its
    /// own storage settings.
    #[command(after_help = r#"Examples:
  s3-mcp-rs http                                  # Listen on 0.0.0.0:3000
  s3-mcp-rs http --host 127.0.0.1 --port 8080
  s3-mcp-rs --buckets docs,media http             # Restrict buckets
  s3-mcp-rs http --session-idle-secs 900          # Evict idle sessions
"#)]
    Http {
        /// Host to bind to. Falls back to `S3_MCP_HOST`, then `0.0.0.0`.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to. Falls back to `S3_MCP_PORT`, then 3000.
        #[arg(long)]
        port: Option<u16>,

        /// Allowed CORS origins, comma-separated. Defaults to any origin.
        #[arg(long, value_delimiter = ',')]
        cors_origin: Option<Vec<String>>,

        /// Evict sessions idle for this many seconds. Sessions are kept
        /// forever when unset.
        #[arg(long)]
        session_idle_secs: Option<u64>,

        /// Seconds between eviction sweeps.
        #[arg(long)]
        sweep_secs: Option<u64>,
    },

    /// Serve MCP over stdin/stdout.
    #[command(after_help = r#"Examples:
  s3-mcp-rs stdio
  AWS_REGION=eu-west-1 s3-mcp-rs --buckets docs stdio
"#)]
    Stdio,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    #[test]
    fn test_http_flags() {
        let cli = parse(&[
            "s3-mcp-rs",
            "http",
            "--port",
            "8080",
            "--cors-origin",
            "https://a.example,https://b.example",
            "--session-idle-secs",
            "30",
        ]);
        match cli.command {
            Commands::Http {
                port,
                cors_origin,
                session_idle_secs,
                host,
                ..
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host, None);
                assert_eq!(cors_origin.map(|o| o.len()), Some(2));
                assert_eq!(session_idle_secs, Some(30));
            }
            Commands::Stdio => unreachable!(),
        }
    }

    #[test]
    fn test_global_store_flags_after_subcommand() {
        let cli = parse(&[
            "s3-mcp-rs",
            "stdio",
            "--region",
            "eu-west-1",
            "--buckets",
            "docs, media",
            "--max-buckets",
            "2",
            "--force-path-style",
        ]);
        let store = cli.store_config();
        assert_eq!(store.region, "eu-west-1");
        assert_eq!(store.buckets, vec!["docs".to_string(), "media".to_string()]);
        assert_eq!(store.max_buckets, 2);
        assert!(store.force_path_style);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["s3-mcp-rs"]).is_err());
    }
}
