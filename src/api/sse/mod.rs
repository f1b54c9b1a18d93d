//! Streamable HTTP transport for MCP
//!
//! Lets AI agents connect over HTTP instead of stdio. Many clients share one
//! listener; each gets its own session and protocol server.
//!
//! ## Endpoint (default `/mcp`)
//! - `POST` - JSON-RPC messages from client→server
//! - `GET` - SSE stream for server→client messages
//! - `DELETE` - end the session named by `Mcp-Session-Id`

pub mod connections;
pub mod error;
pub mod event;
pub mod guard;
pub mod handler;
pub mod session;

pub use connections::{ConnectionId, SseChannel, SseConnectionManager, DEFAULT_CHANNEL_CAPACITY};
pub use error::HttpError;
pub use event::{SseEvent, KEEP_ALIVE};
pub use guard::{HostAllowList, DEFAULT_ALLOWED_HOSTS};
pub use handler::{HttpState, SESSION_ID_HEADER};
pub use session::{
    ServerHandle, SessionId, SessionInfo, SessionRegistry, DEFAULT_SESSION_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL,
};
