//! Request helpers for the MCP server
//!
//! Small functions for pulling tool-call parameters apart and building
//! tool result payloads.

use serde_json::Value;

/// Extract tool arguments from params
pub fn extract_arguments(params: &Value) -> Value {
    params.get("arguments").cloned().unwrap_or(Value::Object(serde_json::Map::new()))
}

/// Extract tool name from params
pub fn extract_tool_name(params: &Value) -> Option<&str> {
    params.get("name").and_then(|v| v.as_str())
}

/// Extract the protocol version a client asked for in `initialize`
pub fn extract_protocol_version(params: Option<&Value>) -> Option<&str> {
    params?.get("protocolVersion").and_then(|v| v.as_str())
}

/// Build a text content response
pub fn text_response(text: String) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }]
    })
}
