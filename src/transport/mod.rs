//! Transports that carry JSON-RPC messages to an [`McpServer`](crate::server::McpServer)
//!
//! Exactly one transport is chosen at startup. Both variants expose the same
//! `run` contract and drive the same protocol server type.

mod stdio;

use std::sync::Arc;

pub use stdio::StdioTransport;

use crate::api::HttpTransport;
use crate::config::{Config, TransportKind};
use crate::error::TransportError;
use crate::protocol::ServerInfo;
use crate::tools::ToolRegistry;

pub enum Transport {
    /// One client over stdin/stdout
    Stdio(StdioTransport),
    /// Many sessions over streamable HTTP
    Http(HttpTransport),
}

impl Transport {
    pub fn from_config(config: &Config, server_info: ServerInfo, tools: Arc<ToolRegistry>) -> Self {
        match config.transport {
            TransportKind::Stdio => Transport::Stdio(StdioTransport::new(server_info, tools)),
            TransportKind::Http => {
                Transport::Http(HttpTransport::new(config.http_config(), server_info, tools))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transport::Stdio(_) => "stdio",
            Transport::Http(_) => "http",
        }
    }

    /// Serve until the input ends or a shutdown signal arrives
    pub async fn run(self) -> Result<(), TransportError> {
        match self {
            Transport::Stdio(transport) => transport.run().await,
            Transport::Http(transport) => transport.run().await,
        }
    }
}
