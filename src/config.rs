//! Runtime configuration
//!
//! Every setting can come from a command-line flag or an `MCP_*` environment
//! variable; flags win.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::api::sse::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_SESSION_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
};

/// Which transport to run
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout, single session
    Stdio,
    /// Streamable HTTP with SSE, many sessions
    Http,
}

/// Command-line and environment configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-session-server", version, about)]
pub struct Config {
    /// Transport to serve on
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Address to bind in HTTP mode
    #[arg(long, env = "MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind in HTTP mode
    #[arg(long, env = "MCP_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path of the MCP endpoint
    #[arg(long, env = "MCP_PATH", default_value = "/mcp")]
    pub path: String,

    /// Idle seconds before a session expires
    #[arg(long, env = "MCP_SESSION_TIMEOUT_SECS", default_value_t = DEFAULT_SESSION_TIMEOUT.as_secs())]
    pub session_timeout_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(long, env = "MCP_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    pub sweep_interval_secs: u64,

    /// Seconds of stream idleness before a keep-alive frame
    #[arg(long, env = "MCP_HEARTBEAT_SECS", default_value_t = 15)]
    pub heartbeat_secs: u64,

    /// Events buffered per SSE connection
    #[arg(long, env = "MCP_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Extra hosts accepted in Origin/Host headers (loopback is always allowed)
    #[arg(long = "allowed-host", env = "MCP_ALLOWED_HOSTS", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "MCP_LOG", default_value = "info")]
    pub log: String,
}

impl Config {
    /// Settings for the HTTP transport
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
            channel_capacity: self.channel_capacity,
            allowed_hosts: self.allowed_hosts.clone(),
        }
    }
}

/// HTTP transport settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub session_timeout: Duration,
    pub sweep_interval: Duration,
    pub heartbeat: Duration,
    pub channel_capacity: usize,
    pub allowed_hosts: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/mcp".to_string(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            heartbeat: Duration::from_secs(15),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            allowed_hosts: Vec::new(),
        }
    }
}
