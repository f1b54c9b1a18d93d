//! Protocol types for MCP and JSON-RPC communication
//!
//! This module contains all protocol-related types and traits.

mod jsonrpc;
mod mcp;
mod message;

pub use jsonrpc::{
    ErrorObject, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
pub use mcp::{
    negotiate_protocol_version, McpTool, ServerInfo, Tool, LATEST_PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS,
};
pub use message::{InvalidMessage, JsonRpcMessage, ParseError};
