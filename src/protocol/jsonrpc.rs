//! JSON-RPC 2.0 protocol types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The only supported `jsonrpc` version tag
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A request id. Numbers and strings are kept exactly as received.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

impl RequestId {
    /// Read an id from a raw JSON value; `null` and other types yield `None`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

// Read through `Value` so numeric ids keep their original digits
impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RequestId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("id must be a string or a number"))
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// JSON-RPC 2.0 Request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Notification (a request without an id)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Success Response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    /// Create a new success response
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result,
        }
    }
}

/// JSON-RPC 2.0 Error Response
///
/// `id` serializes as `null` when the request id could not be determined.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub error: ErrorObject,
}

impl JsonRpcError {
    /// Create a new error response
    pub fn new(id: Option<RequestId>, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            error: ErrorObject {
                code,
                message,
                data,
            },
        }
    }

    /// Create a parse error response
    pub fn parse_error(details: String) -> Self {
        Self::new(
            None,
            PARSE_ERROR,
            "Parse error".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }

    /// Create an invalid request error response
    pub fn invalid_request(id: Option<RequestId>, details: String) -> Self {
        Self::new(
            id,
            INVALID_REQUEST,
            "Invalid Request".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }

    /// Create a method not found error response
    pub fn method_not_found(id: RequestId, method: String) -> Self {
        Self::new(
            Some(id),
            METHOD_NOT_FOUND,
            "Method not found".to_string(),
            Some(serde_json::json!({"method": method})),
        )
    }

    /// Create an invalid params error response
    pub fn invalid_params(id: RequestId, details: String) -> Self {
        Self::new(
            Some(id),
            INVALID_PARAMS,
            "Invalid params".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }

    /// Create an internal error response
    pub fn internal_error(id: Option<RequestId>, details: String) -> Self {
        Self::new(
            id,
            INTERNAL_ERROR,
            "Internal error".to_string(),
            Some(serde_json::json!({"details": details})),
        )
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create a new error object
    pub fn new(code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            code,
            message,
            data,
        }
    }
}
