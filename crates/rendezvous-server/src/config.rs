use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use tracing::warn;

const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_KEY_LENGTH: usize = 4;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// How the HTTP join endpoint treats an unknown group key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum JoinPolicy {
    /// Unknown group answers 404.
    #[default]
    Strict,
    /// Unknown group is created on the spot.
    Lenient,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "rendezvous-server")]
#[command(about = "Rendezvous signaling relay - routes WebRTC signaling between named peers")]
pub struct Config {
    /// HTTP/WebSocket listen address
    #[arg(long, env = "RENDEZVOUS_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Directory served for paths no API route claims
    #[arg(long, env = "RENDEZVOUS_STATIC_DIR", default_value = "web")]
    pub static_dir: PathBuf,

    /// Policy of POST /group/join for unknown groups
    #[arg(long, env = "RENDEZVOUS_JOIN_POLICY", value_enum, default_value_t = JoinPolicy::Strict)]
    pub join_policy: JoinPolicy,

    /// Comma separated CORS origins; empty allows any origin
    #[arg(long, env = "RENDEZVOUS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Upper bound for HTTP request bodies
    #[arg(long, env = "RENDEZVOUS_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Length of server-assigned user keys
    #[arg(long, env = "RENDEZVOUS_KEY_LENGTH", default_value_t = DEFAULT_KEY_LENGTH)]
    pub key_length: usize,

    /// Seconds a peer may take to accept a frame before the send fails
    #[arg(
        long,
        env = "RENDEZVOUS_WRITE_TIMEOUT_SECS",
        default_value_t = DEFAULT_WRITE_TIMEOUT_SECS
    )]
    pub write_timeout_secs: u64,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "RENDEZVOUS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("web"),
            join_policy: JoinPolicy::Strict,
            allowed_origins: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            key_length: DEFAULT_KEY_LENGTH,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> rendezvous_common::Result<()> {
        if self.key_length == 0 {
            return Err(rendezvous_common::Error::config("key length must be positive"));
        }
        if self.write_timeout_secs == 0 {
            return Err(rendezvous_common::Error::config(
                "write timeout must be positive",
            ));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Parsed CORS origins. `None` means any origin is allowed.
    pub fn cors_origins(&self) -> Option<Vec<HeaderValue>> {
        let configured: Vec<&str> = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().trim_end_matches('/'))
            .filter(|origin| !origin.is_empty())
            .collect();
        if configured.is_empty() {
            return None;
        }

        Some(
            configured
                .into_iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                })
                .collect(),
        )
    }
}
