//! MCP Session Server
//!
//! A Model Context Protocol server that runs either as a single-client stdio
//! process or as a multi-session streamable HTTP service with SSE.
//!
//! # Features
//!
//! - **Sessions**: Each HTTP client owns an isolated server instance keyed by `Mcp-Session-Id`
//! - **Streaming**: Server-to-client events over `text/event-stream` with heartbeats
//! - **Batches**: JSON-RPC batches handled in order with per-unit responses
//! - **Expiry**: Idle sessions are swept in the background
//!
//! # Modules
//!
//! - `protocol`: MCP and JSON-RPC protocol types
//! - `server`: Per-session MCP protocol server
//! - `tools`: Tool registry and built-in tools
//! - `api`: Streamable HTTP endpoint, session registry and SSE connections
//! - `transport`: Stdio and HTTP transports behind one entry point
//! - `config`: Command-line and environment configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp_session_server::api::HttpTransport;
//! use mcp_session_server::config::HttpConfig;
//! use mcp_session_server::tools::{register_builtin_tools, ToolRegistry};
//! use mcp_session_server::ServerInfo;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut tools = ToolRegistry::new();
//!     register_builtin_tools(&mut tools);
//!     let transport = HttpTransport::new(HttpConfig::default(), ServerInfo::default(), Arc::new(tools));
//!     transport.run().await.unwrap();
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

// Re-export commonly used items at crate root
pub use api::sse::{SessionRegistry, SseConnectionManager, SseEvent};
pub use error::{McpResult, SessionError, TransportError};
pub use protocol::{JsonRpcMessage, McpTool, ServerInfo, Tool};
pub use server::McpServer;
pub use transport::Transport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
