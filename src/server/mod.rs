//! MCP Server implementation
//!
//! [`McpServer`] is the protocol state machine behind every transport. It
//! knows nothing about stdio or HTTP: a transport hands it one classified
//! message at a time and writes back whatever it returns. The HTTP transport
//! gives each session its own instance, so initialization state is never
//! shared between clients.

mod handlers;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::protocol::{
    negotiate_protocol_version, JsonRpcError, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, ServerInfo, INTERNAL_ERROR, INVALID_PARAMS,
};
use crate::tools::ToolRegistry;

pub use handlers::*;

/// Lifecycle of one protocol server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for `initialize`
    Uninitialized,
    /// `initialize` answered, waiting for `notifications/initialized`
    Initializing,
    /// Handshake complete
    Ready,
}

/// MCP Server that handles JSON-RPC messages for a single client
pub struct McpServer {
    server_info: ServerInfo,
    tools: Arc<ToolRegistry>,
    state: ServerState,
    protocol_version: Option<&'static str>,
    client_info: Option<Value>,
}

impl McpServer {
    /// Create a new server instance over a shared tool registry
    pub fn new(server_info: ServerInfo, tools: Arc<ToolRegistry>) -> Self {
        Self {
            server_info,
            tools,
            state: ServerState::Uninitialized,
            protocol_version: None,
            client_info: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Protocol version agreed on during `initialize`
    pub fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version
    }

    /// The `clientInfo` object sent with `initialize`, if any
    pub fn client_info(&self) -> Option<&Value> {
        self.client_info.as_ref()
    }

    /// Get the number of registered tools
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Handle one message unit or batch.
    ///
    /// Requests always produce a response. Notifications, client responses
    /// and client errors produce nothing. A batch yields a batch of the
    /// responses in input order, or nothing if none of its units answer.
    pub fn handle(&mut self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request)),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification);
                None
            }
            JsonRpcMessage::Response(response) => {
                debug!(id = ?response.id, "Ignoring client response");
                None
            }
            JsonRpcMessage::Error(error) => {
                debug!(id = ?error.id, code = error.error.code, "Ignoring client error");
                None
            }
            JsonRpcMessage::Batch(units) => {
                let responses: Vec<JsonRpcMessage> =
                    units.into_iter().filter_map(|unit| self.handle(unit)).collect();
                if responses.is_empty() {
                    None
                } else {
                    Some(JsonRpcMessage::Batch(responses))
                }
            }
        }
    }

    /// Handle a single JSON-RPC request
    fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id;
        debug!(method = %request.method, id = ?id, "Handling request");

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(id.clone(), request.params),
            "ping" => Ok(JsonRpcResponse::new(id.clone(), json!({}))),
            method if self.state == ServerState::Uninitialized => Err(
                JsonRpcError::invalid_request(
                    Some(id.clone()),
                    format!("server not initialized, cannot handle '{}'", method),
                ),
            ),
            "tools/list" => Ok(self.handle_tools_list(id.clone())),
            "tools/call" => self.handle_tool_call(id.clone(), request.params),
            _ => Err(JsonRpcError::method_not_found(id.clone(), request.method.clone())),
        };

        match result {
            Ok(response) => response.into(),
            Err(error) => error.into(),
        }
    }

    fn handle_notification(&mut self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => {
                if self.state == ServerState::Initializing {
                    self.state = ServerState::Ready;
                }
            }
            "notifications/cancelled" => {
                debug!("Ignoring cancellation");
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Handle initialize request
    fn handle_initialize(
        &mut self,
        id: RequestId,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::Uninitialized {
            warn!("Rejecting repeated initialize");
            return Err(JsonRpcError::invalid_request(
                Some(id),
                "server already initialized".to_string(),
            ));
        }

        let version = negotiate_protocol_version(extract_protocol_version(params.as_ref()));
        self.protocol_version = Some(version);
        self.client_info = params.as_ref().and_then(|p| p.get("clientInfo")).cloned();
        self.state = ServerState::Initializing;

        let result = json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version
            }
        });
        Ok(JsonRpcResponse::new(id, result))
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = json!({ "tools": self.tools.definitions() });
        JsonRpcResponse::new(id, result)
    }

    /// Handle tools/call request
    fn handle_tool_call(
        &self,
        id: RequestId,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let params = params.ok_or_else(|| {
            JsonRpcError::invalid_params(id.clone(), "Missing parameters".to_string())
        })?;
        let tool_name = extract_tool_name(&params).ok_or_else(|| {
            JsonRpcError::invalid_params(id.clone(), "Missing tool name".to_string())
        })?;

        let tool = self.tools.get(tool_name).ok_or_else(|| {
            JsonRpcError::new(
                Some(id.clone()),
                INVALID_PARAMS,
                "Unknown tool".to_string(),
                Some(json!({"tool": tool_name})),
            )
        })?;

        match tool.execute(extract_arguments(&params)) {
            Ok(result) => Ok(JsonRpcResponse::new(id, result)),
            Err(e) => {
                warn!(tool = tool_name, error = %e, "Tool execution failed");
                Err(JsonRpcError::new(
                    Some(id),
                    INTERNAL_ERROR,
                    "Tool execution error".to_string(),
                    Some(json!({"details": e.to_string()})),
                ))
            }
        }
    }
}
