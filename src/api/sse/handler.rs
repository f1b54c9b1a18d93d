//! MCP streamable HTTP handlers
//!
//! One path serves three methods:
//! - `POST` submits a JSON-RPC message or batch
//! - `GET` opens a server-to-client SSE stream
//! - `DELETE` ends the session

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use super::connections::SseChannel;
use super::error::HttpError;
use super::guard::{
    accepts, accepts_exactly, require_json_content_type, HostAllowList, APPLICATION_JSON,
    TEXT_EVENT_STREAM,
};
use super::event::SseEvent;
use super::session::{SessionId, SessionRegistry};
use crate::protocol::JsonRpcMessage;
use crate::server::McpServer;

/// Session header, both directions
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Shared state for the MCP endpoint
pub struct HttpState {
    pub sessions: Arc<SessionRegistry>,
    pub allow_list: HostAllowList,
    pub heartbeat: Duration,
}

impl HttpState {
    pub fn new(sessions: Arc<SessionRegistry>, allow_list: HostAllowList, heartbeat: Duration) -> Self {
        Self {
            sessions,
            allow_list,
            heartbeat,
        }
    }
}

/// How POST results travel back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyMode {
    Json,
    Stream,
}

/// Responses produced for one POST body
struct Reply {
    responses: Vec<JsonRpcMessage>,
    batch: bool,
}

impl Reply {
    /// The JSON body: one object for a single unit, an array for a batch
    fn into_body(self) -> Option<JsonRpcMessage> {
        if self.responses.is_empty() {
            None
        } else if self.batch {
            Some(JsonRpcMessage::Batch(self.responses))
        } else {
            self.responses.into_iter().next()
        }
    }
}

/// Read the session header; `Ok(None)` if absent
fn session_id(headers: &HeaderMap) -> Result<Option<&str>, HttpError> {
    match headers.get(SESSION_ID_HEADER) {
        None => Ok(None),
        Some(value) => match value.to_str() {
            Ok(id) if !id.trim().is_empty() => Ok(Some(id.trim())),
            _ => Err(HttpError::InvalidSessionId),
        },
    }
}

fn post_reply_mode(headers: &HeaderMap) -> Result<ReplyMode, HttpError> {
    if accepts_exactly(headers, TEXT_EVENT_STREAM) && !accepts_exactly(headers, APPLICATION_JSON) {
        Ok(ReplyMode::Stream)
    } else if accepts(headers, APPLICATION_JSON) {
        Ok(ReplyMode::Json)
    } else {
        Err(HttpError::NotAcceptable("application/json or text/event-stream"))
    }
}

fn is_initialize(message: &JsonRpcMessage) -> bool {
    message.is_request() && message.method() == Some("initialize")
}

/// Route each unit to the server in order; notifications and client
/// responses leave no entry
fn dispatch(server: &mut McpServer, message: JsonRpcMessage) -> Reply {
    match message {
        JsonRpcMessage::Batch(units) => Reply {
            responses: units.into_iter().filter_map(|unit| server.handle(unit)).collect(),
            batch: true,
        },
        unit => Reply {
            responses: server.handle(unit).into_iter().collect(),
            batch: false,
        },
    }
}

fn with_session_header(mut response: Response, session_id: Option<&str>) -> Response {
    if let Some(id) = session_id {
        if let Ok(value) = HeaderValue::from_str(id) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
    }
    response
}

/// Stream a channel's events as `text/event-stream`
fn sse_response(channel: SseChannel, heartbeat: Duration) -> Response {
    let body = Body::from_stream(channel.into_stream(heartbeat));
    (
        [
            (header::CONTENT_TYPE, TEXT_EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Deliver POST results as SSE events on a short-lived connection
fn stream_reply(
    state: &HttpState,
    session_id: &str,
    responses: Vec<JsonRpcMessage>,
) -> Result<Response, HttpError> {
    let (connection_id, channel) =
        state.sessions.open_connection(session_id, Some(responses.len()))?;
    let connections = state.sessions.connections();

    for response in &responses {
        let json = response
            .to_json()
            .map_err(|e| HttpError::Internal(e.to_string()))?;
        connections.push(&connection_id, SseEvent::message(json));
    }
    // closing the sender ends the stream once the queued events are sent
    connections.unregister(&connection_id);

    Ok(sse_response(channel, state.heartbeat))
}

/// POST /mcp - Handle JSON-RPC messages
pub async fn post_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpError> {
    require_json_content_type(&headers)?;
    let mode = post_reply_mode(&headers)?;
    state.allow_list.check(&headers)?;

    // an unknown session is 404 whatever the body holds
    let existing = match session_id(&headers)? {
        Some(id) => Some((id.to_string(), state.sessions.lookup(id)?)),
        None => None,
    };

    let value: Value = serde_json::from_slice(&body).map_err(|e| HttpError::Parse(e.to_string()))?;
    let message = JsonRpcMessage::classify(value)?;

    let (session_id, server, created): (SessionId, _, bool) = match existing {
        Some((id, server)) => (id, server, false),
        None if is_initialize(&message) => {
            let (id, server) = state.sessions.create_session();
            (id, server, true)
        }
        None => return Err(HttpError::MissingSessionId),
    };

    let reply = {
        let mut server = server.lock().await;
        dispatch(&mut server, message)
    };

    if created && matches!(reply.responses.first(), Some(JsonRpcMessage::Error(_))) {
        state.sessions.terminate(&session_id);
        info!(session_id = %session_id, "Initialize failed, session discarded");
        let body = reply.into_body();
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    state.sessions.touch(&session_id);
    debug!(session_id = %session_id, responses = reply.responses.len(), "Request routed");

    let header_id = created.then_some(session_id.as_str());
    if reply.responses.is_empty() {
        return Ok(with_session_header(StatusCode::ACCEPTED.into_response(), header_id));
    }

    let response = match mode {
        ReplyMode::Stream => stream_reply(&state, &session_id, reply.responses)?,
        ReplyMode::Json => (StatusCode::OK, Json(reply.into_body())).into_response(),
    };
    Ok(with_session_header(response, header_id))
}

/// GET /mcp - SSE stream for server→client messages
pub async fn get_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    if !accepts(&headers, TEXT_EVENT_STREAM) {
        return Err(HttpError::NotAcceptable(TEXT_EVENT_STREAM));
    }
    state.allow_list.check(&headers)?;

    let session_id = session_id(&headers)?.ok_or(HttpError::MissingSessionId)?;
    let (connection_id, channel) = state.sessions.open_connection(session_id, None)?;
    state.sessions.touch(session_id);

    debug!(session_id, connection_id = %connection_id, "SSE stream opened");
    Ok(sse_response(channel, state.heartbeat))
}

/// DELETE /mcp - Terminate the caller's session
pub async fn delete_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Result<StatusCode, HttpError> {
    state.allow_list.check(&headers)?;
    let session_id = session_id(&headers)?.ok_or(HttpError::MissingSessionId)?;

    if !state.sessions.terminate(session_id) {
        debug!(session_id, "DELETE for unknown session");
    }
    Ok(StatusCode::NO_CONTENT)
}
