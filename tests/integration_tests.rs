//! Integration tests for the streamable HTTP transport

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use mcp_session_server::api::sse::SESSION_ID_HEADER;
use mcp_session_server::api::HttpTransport;
use mcp_session_server::config::HttpConfig;
use mcp_session_server::protocol::{JsonRpcNotification, INVALID_PARAMS, INVALID_REQUEST};
use mcp_session_server::tools::{register_builtin_tools, ToolRegistry};
use mcp_session_server::{JsonRpcMessage, ServerInfo};

const BOTH: &str = "application/json, text/event-stream";

fn setup() -> (HttpTransport, Router) {
    let mut tools = ToolRegistry::new();
    register_builtin_tools(&mut tools);
    let config = HttpConfig {
        heartbeat: Duration::from_secs(3600),
        ..HttpConfig::default()
    };
    let transport = HttpTransport::new(config, ServerInfo::default(), Arc::new(tools));
    let app = transport.router();
    (transport, app)
}

fn post(session: Option<&str>, accept: &str, body: impl Into<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, accept);
    if let Some(id) = session {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    builder.body(Body::from(body.into())).unwrap()
}

fn initialize_body(id: i64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "0.1.0"}
        }
    })
    .to_string()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SESSION_ID_HEADER)
        .map(|v| v.to_str().unwrap().to_string())
}

/// Initialize a session and complete the handshake; returns its id
async fn open_session(app: &Router) -> String {
    let response = send(app, post(None, BOTH, initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = session_header(&response).expect("session header");

    let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = send(app, post(Some(&session_id), BOTH, initialized.to_string())).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    session_id
}

#[tokio::test]
async fn test_initialize_creates_session() {
    let (transport, app) = setup();

    let response = send(&app, post(None, BOTH, initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let session_id = session_header(&response).expect("session header");

    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
    assert!(body["result"]["capabilities"]["tools"].is_object());

    assert_eq!(transport.state().sessions.session_count(), 1);
    assert!(transport.state().sessions.lookup(&session_id).is_ok());
}

#[tokio::test]
async fn test_sessions_initialize_independently() {
    let (transport, app) = setup();

    let first = open_session(&app).await;
    let response = send(&app, post(None, BOTH, initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = session_header(&response).unwrap();
    let body = json_body(response).await;

    assert_ne!(first, second);
    assert!(body.get("error").is_none());
    assert_eq!(transport.state().sessions.session_count(), 2);
}

#[tokio::test]
async fn test_repeated_initialize_in_session_is_rejected() {
    let (transport, app) = setup();
    let session_id = open_session(&app).await;

    let response = send(&app, post(Some(&session_id), BOTH, initialize_body(2))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_header(&response).is_none());
    let body = json_body(response).await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["error"]["code"], INVALID_REQUEST);

    assert_eq!(transport.state().sessions.session_count(), 1);
}

#[tokio::test]
async fn test_notification_is_accepted() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let body = json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 9}});
    let response = send(&app, post(Some(&session_id), BOTH, body.to_string())).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_tools_list_and_call() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let list = json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"});
    let body = json_body(send(&app, post(Some(&session_id), BOTH, list.to_string())).await).await;
    assert_eq!(body["id"], "list");
    assert_eq!(body["result"]["tools"][0]["name"], "get_current_time");

    let call = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {"name": "get_current_time", "arguments": {}}
    });
    let body = json_body(send(&app, post(Some(&session_id), BOTH, call.to_string())).await).await;
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    let info: Value = serde_json::from_str(text).unwrap();
    assert!(info["timestamp"].is_i64());

    let unknown = json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": {"name": "no_such_tool"}
    });
    let body = json_body(send(&app, post(Some(&session_id), BOTH, unknown.to_string())).await).await;
    assert_eq!(body["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn test_batch_preserves_order_and_skips_notifications() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let batch = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "ping"},
        {"jsonrpc": "2.0", "method": "notifications/cancelled"},
        {"jsonrpc": "2.0", "id": "b", "method": "tools/list"},
        {"jsonrpc": "2.0", "id": 3, "method": "no/such/method"}
    ]);
    let response = send(&app, post(Some(&session_id), BOTH, batch.to_string())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["id"], 1);
    assert_eq!(entries[1]["id"], "b");
    assert_eq!(entries[2]["id"], 3);
    assert_eq!(entries[2]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_notification_only_batch_is_accepted() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let batch = json!([
        {"jsonrpc": "2.0", "method": "notifications/cancelled"},
        {"jsonrpc": "2.0", "method": "notifications/progress"}
    ]);
    let response = send(&app, post(Some(&session_id), BOTH, batch.to_string())).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_batch_with_invalid_unit_is_rejected() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let batch = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "ping"},
        {"jsonrpc": "1.0", "id": 2, "method": "ping"}
    ]);
    let response = send(&app, post(Some(&session_id), BOTH, batch.to_string())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post(Some(&session_id), BOTH, "[]")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_origin_allow_list() {
    let (_transport, app) = setup();

    for origin in ["http://localhost:8080", "http://127.0.0.1", "http://[::1]:8080"] {
        let mut request = post(None, BOTH, initialize_body(1));
        request
            .headers_mut()
            .insert(header::ORIGIN, origin.parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK, "origin {}", origin);
    }

    for origin in ["http://example.com", "http://192.168.1.1", "file:///etc/passwd"] {
        let mut request = post(None, BOTH, initialize_body(1));
        request
            .headers_mut()
            .insert(header::ORIGIN, origin.parse().unwrap());
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "origin {}", origin);
    }
}

#[tokio::test]
async fn test_host_allow_list() {
    let (transport, app) = setup();

    let mut request = post(None, BOTH, initialize_body(1));
    request
        .headers_mut()
        .insert(header::HOST, "localhost:8000".parse().unwrap());
    assert_eq!(send(&app, request).await.status(), StatusCode::OK);

    let mut request = post(None, BOTH, initialize_body(1));
    request
        .headers_mut()
        .insert(header::HOST, "attacker.example:8000".parse().unwrap());
    assert_eq!(send(&app, request).await.status(), StatusCode::FORBIDDEN);

    assert_eq!(transport.state().sessions.session_count(), 1);
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let (_transport, app) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::ACCEPT, BOTH)
        .body(Body::from(initialize_body(1)))
        .unwrap();
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );
}

#[tokio::test]
async fn test_unacceptable_accept_header() {
    let (_transport, app) = setup();

    let response = send(&app, post(None, "text/html", initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(initialize_body(1)))
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NOT_ACCEPTABLE);

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_missing_session_is_bad_request() {
    let (transport, app) = setup();

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = send(&app, post(None, BOTH, ping.to_string())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(transport.state().sessions.session_count(), 0);

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header(header::ACCEPT, "text/event-stream")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let response = send(&app, post(Some(&session_id), BOTH, "{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32700);

    let response = send(&app, post(Some(&session_id), BOTH, r#"{"jsonrpc":"2.0"}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (_transport, app) = setup();

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = send(&app, post(Some("deadbeef"), BOTH, ping.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // the session is checked before the body
    let response = send(&app, post(Some("deadbeef"), BOTH, "{not json")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, post(Some("deadbeef"), BOTH, initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_terminates_session() {
    let (transport, app) = setup();
    let session_id = open_session(&app).await;

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/mcp")
            .header(SESSION_ID_HEADER, session_id.as_str())
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, delete()).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(transport.state().sessions.session_count(), 0);
    assert_eq!(send(&app, delete()).await.status(), StatusCode::NO_CONTENT);

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = send(&app, post(Some(&session_id), BOTH, ping.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_stream_receives_notifications_until_delete() {
    let (transport, app) = setup();
    let session_id = open_session(&app).await;

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .header(header::ACCEPT, "text/event-stream")
        .header(SESSION_ID_HEADER, session_id.as_str())
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let mut stream = response.into_body().into_data_stream();

    let sessions = &transport.state().sessions;
    assert_eq!(sessions.connections().connection_ids(&session_id).len(), 1);

    let notification = JsonRpcNotification::new(
        "notifications/message",
        Some(json!({"level": "info", "data": "hello"})),
    );
    let message = JsonRpcMessage::from(notification);
    assert_eq!(sessions.notify(&session_id, &message), 1);

    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let frame = String::from_utf8(frame.to_vec()).unwrap();
    assert!(frame.starts_with("id: "));
    assert!(frame.contains("event: message\n"));
    assert!(frame.contains("\"notifications/message\""));
    assert!(frame.ends_with("\n\n"));

    let request = Request::builder()
        .method("DELETE")
        .uri("/mcp")
        .header(SESSION_ID_HEADER, session_id.as_str())
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NO_CONTENT);

    let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap();
    assert!(end.is_none());
    assert_eq!(sessions.connections().connection_count(), 0);
}

#[tokio::test]
async fn test_post_with_stream_accept_replies_over_sse() {
    let (transport, app) = setup();
    let session_id = open_session(&app).await;

    let batch = json!([
        {"jsonrpc": "2.0", "id": 7, "method": "ping"},
        {"jsonrpc": "2.0", "id": 8, "method": "tools/list"}
    ]);
    let response = send(
        &app,
        post(Some(&session_id), "text/event-stream", batch.to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let bytes = tokio::time::timeout(
        Duration::from_secs(5),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .unwrap()
    .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let frames: Vec<&str> = text.split("\n\n").filter(|f| !f.is_empty()).collect();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains("\"id\":7"));
    assert!(frames[1].contains("\"id\":8"));
    assert_eq!(transport.state().sessions.connections().connection_count(), 0);
}

#[tokio::test]
async fn test_json_refused_with_zero_quality() {
    let (_transport, app) = setup();
    let session_id = open_session(&app).await;

    let ping = json!({"jsonrpc": "2.0", "id": 5, "method": "ping"});
    let response = send(
        &app,
        post(
            Some(&session_id),
            "application/json;q=0, text/event-stream",
            ping.to_string(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let response = send(&app, post(Some(&session_id), "application/json;q=0", ping.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_transport, app) = setup();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}
