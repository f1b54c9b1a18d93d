//! MCP (Model Context Protocol) types

use serde::Serialize;
use serde_json::Value;

use crate::error::McpResult;

/// Protocol revisions this server can speak, oldest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Revision offered when the client asks for one we don't know
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Pick the protocol version to answer `initialize` with
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

/// MCP Tool definition
#[derive(Serialize, Debug, Clone)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpTool {
    /// Create a new MCP tool definition
    pub fn new(name: String, description: String, input_schema: Value) -> Self {
        Self {
            name,
            description,
            input_schema,
        }
    }
}

/// Server information for MCP handshake
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    /// Create new server info
    pub fn new(name: String, version: String) -> Self {
        Self { name, version }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: crate::NAME.to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Trait for MCP tools
///
/// The data-access layer exposes itself through implementations of this
/// trait. Tools are shared by every session, so they must be `Send + Sync`.
pub trait Tool: Send + Sync {
    /// Get the tool definition for tools/list
    fn definition(&self) -> McpTool;

    /// Execute the tool with the given parameters
    fn execute(&self, params: Value) -> McpResult<Value>;

    /// Get the tool name (convenience method)
    fn name(&self) -> String {
        self.definition().name
    }
}
