use std::path::PathBuf;
use std::time::Duration;

use audio_focus_core::{ArbiterConfig, DEFAULT_APP_PID};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7788";

/// Configuration for `RpcTransport`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Policy server address (default: 127.0.0.1:7788).
    pub server_addr: String,

    /// Reconnect attempts after the first one fails (default: 3).
    pub retry_count: u32,

    /// Fixed wait between connection attempts (default: 1 s).
    pub retry_backoff: Duration,

    /// Bound on a single request/response round trip (default: 5 s).
    pub io_timeout: Duration,

    /// Pid announced in the handshake.
    pub pid: i32,
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            ..Default::default()
        }
    }

    /// The initial attempt plus `retry_count` retries.
    pub fn connect_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server_addr.is_empty() {
            return Err("server address is empty".into());
        }
        if self.retry_count == 0 {
            return Err("retry count must be at least 1".into());
        }
        if self.io_timeout.is_zero() {
            return Err("io timeout must be positive".into());
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.into(),
            retry_count: 3,
            retry_backoff: Duration::from_secs(1),
            io_timeout: Duration::from_secs(5),
            pid: DEFAULT_APP_PID,
        }
    }
}

/// Configuration for `PolicyServer`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1:7788).
    pub bind_addr: Option<String>,

    pub arbiter: ArbiterConfig,

    /// Optional JSON file with focus table overrides.
    pub policy_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_SERVER_ADDR)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.arbiter.validate()
    }
}
