//! HTTP-level rejections of the MCP endpoint

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::SessionError;
use crate::protocol::{
    InvalidMessage, JsonRpcError, INTERNAL_ERROR, INVALID_REQUEST, PARSE_ERROR,
};

/// JSON-RPC error code reported with a 404 for an unknown session
pub const SESSION_NOT_FOUND: i32 = -32001;

/// A request rejected before (or instead of) reaching a session
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("unsupported content type '{0}', expected application/json")]
    UnsupportedMediaType(String),

    #[error("not acceptable: client must accept {0}")]
    NotAcceptable(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidMessage(#[from] InvalidMessage),

    #[error("bad request: missing Mcp-Session-Id header")]
    MissingSessionId,

    #[error("bad request: malformed Mcp-Session-Id header")]
    InvalidSessionId,

    #[error(transparent)]
    SessionNotFound(#[from] SessionError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            HttpError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::Parse(_)
            | HttpError::InvalidMessage(_)
            | HttpError::MissingSessionId
            | HttpError::InvalidSessionId => StatusCode::BAD_REQUEST,
            HttpError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC error body sent with the status
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            HttpError::Parse(details) => JsonRpcError::parse_error(details.clone()),
            HttpError::SessionNotFound(_) => JsonRpcError::new(
                None,
                SESSION_NOT_FOUND,
                "Session not found".to_string(),
                Some(json!({"details": self.to_string()})),
            ),
            HttpError::Internal(details) => JsonRpcError::internal_error(None, details.clone()),
            other => JsonRpcError::new(
                None,
                INVALID_REQUEST,
                other.to_string(),
                None,
            ),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::FORBIDDEN {
            tracing::warn!(error = %self, "Rejected request");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Rejected request");
        }
        (status, Json(self.to_jsonrpc())).into_response()
    }
}
