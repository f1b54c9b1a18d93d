//! Classification of raw JSON payloads into JSON-RPC message units

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::jsonrpc::{
    ErrorObject, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};

/// One JSON-RPC message unit, or an ordered batch of them
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
    Batch(Vec<JsonRpcMessage>),
}

/// Why a payload is not a JSON-RPC message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMessage {
    #[error("expected a JSON object or array")]
    NotAnObject,
    #[error("batch must not be empty")]
    EmptyBatch,
    #[error("batches cannot be nested")]
    NestedBatch,
    #[error("unsupported jsonrpc version")]
    UnsupportedVersion,
    #[error("method must be a string")]
    InvalidMethod,
    #[error("id must be a number or a string")]
    InvalidId,
    #[error("malformed error object: {0}")]
    InvalidErrorObject(String),
    #[error("message has none of method, result or error")]
    Unrecognized,
}

impl JsonRpcMessage {
    /// Classify a parsed JSON body.
    ///
    /// A unit with `method` and `id` is a request, `method` alone is a
    /// notification, `result` without `method` a response and `error`
    /// without `method` an error response. An `id` of `null` counts as absent.
    pub fn classify(value: Value) -> Result<Self, InvalidMessage> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(InvalidMessage::EmptyBatch);
                }
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Array(_) => Err(InvalidMessage::NestedBatch),
                        other => classify_unit(other),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(JsonRpcMessage::Batch)
            }
            other => classify_unit(other),
        }
    }

    /// Parse and classify a raw string
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value)?)
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, JsonRpcMessage::Batch(_))
    }

    /// The method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    /// Iterate over the units of this message (a non-batch is a single unit)
    pub fn units(&self) -> std::slice::Iter<'_, JsonRpcMessage> {
        match self {
            JsonRpcMessage::Batch(units) => units.iter(),
            single => std::slice::from_ref(single).iter(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        JsonRpcMessage::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        JsonRpcMessage::Error(error)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        JsonRpcMessage::Notification(notification)
    }
}

/// Failure to turn raw text into a message
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid JSON-RPC message: {0}")]
    Invalid(#[from] InvalidMessage),
}

fn classify_unit(value: Value) -> Result<JsonRpcMessage, InvalidMessage> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => return Err(InvalidMessage::NotAnObject),
    };

    let jsonrpc = match obj.remove("jsonrpc") {
        None => JSONRPC_VERSION.to_string(),
        Some(Value::String(v)) if v == JSONRPC_VERSION => v,
        Some(_) => return Err(InvalidMessage::UnsupportedVersion),
    };
    let id = take_id(&mut obj)?;

    if let Some(method) = obj.remove("method") {
        let method = match method {
            Value::String(m) => m,
            _ => return Err(InvalidMessage::InvalidMethod),
        };
        let params = obj.remove("params");
        return Ok(match id {
            Some(id) => JsonRpcMessage::Request(JsonRpcRequest {
                jsonrpc,
                id,
                method,
                params,
            }),
            None => JsonRpcMessage::Notification(JsonRpcNotification {
                jsonrpc,
                method,
                params,
            }),
        });
    }

    if let Some(result) = obj.remove("result") {
        let id = id.ok_or(InvalidMessage::InvalidId)?;
        return Ok(JsonRpcMessage::Response(JsonRpcResponse {
            jsonrpc,
            id,
            result,
        }));
    }

    if let Some(error) = obj.remove("error") {
        let error: ErrorObject = serde_json::from_value(error)
            .map_err(|e| InvalidMessage::InvalidErrorObject(e.to_string()))?;
        return Ok(JsonRpcMessage::Error(JsonRpcError { jsonrpc, id, error }));
    }

    Err(InvalidMessage::Unrecognized)
}

fn take_id(obj: &mut Map<String, Value>) -> Result<Option<RequestId>, InvalidMessage> {
    match obj.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => RequestId::from_value(&value)
            .map(Some)
            .ok_or(InvalidMessage::InvalidId),
    }
}
