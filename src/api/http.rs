//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::sse::handler::{delete_handler, get_handler, post_handler, HttpState};
use super::sse::{HostAllowList, SessionRegistry, SseConnectionManager};
use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::protocol::ServerInfo;
use crate::tools::ToolRegistry;

/// Create the Axum router serving the MCP endpoint at `path`
pub fn create_router(state: Arc<HttpState>, path: &str) -> Router {
    Router::new()
        .route(path, get(get_handler).post(post_handler).delete(delete_handler))
        // Health check
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Multi-session streamable HTTP transport
pub struct HttpTransport {
    config: HttpConfig,
    state: Arc<HttpState>,
}

impl HttpTransport {
    pub fn new(config: HttpConfig, server_info: ServerInfo, tools: Arc<ToolRegistry>) -> Self {
        let connections = SseConnectionManager::new(config.channel_capacity);
        let sessions = Arc::new(SessionRegistry::new(
            server_info,
            tools,
            connections,
            config.session_timeout,
        ));
        let allow_list = HostAllowList::with_extra(&config.allowed_hosts);
        let state = Arc::new(HttpState::new(sessions, allow_list, config.heartbeat));
        Self { config, state }
    }

    pub fn state(&self) -> &Arc<HttpState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), &self.config.path)
    }

    /// Bind, serve until Ctrl-C/SIGTERM, then close every session
    pub async fn run(self) -> Result<(), TransportError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let sessions = Arc::clone(&self.state.sessions);
        let sweeper = sessions.spawn_sweeper(self.config.sweep_interval);
        info!(
            addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or(addr),
            path = %self.config.path,
            "HTTP transport listening"
        );

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let closed = sessions.terminate_all();
                info!(sessions = closed, "Shutting down");
            })
            .await;

        sweeper.abort();
        result.map_err(TransportError::from)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
