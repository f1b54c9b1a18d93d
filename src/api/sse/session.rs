//! Session management for the streamable HTTP transport
//!
//! Every session owns its own [`McpServer`]. All registry mutations take the
//! write lock, and opening a stream happens under the read lock, so a stream
//! can never be attached to a session that `terminate` or `sweep` already
//! tore down.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connections::{ConnectionId, SseChannel, SseConnectionManager};
use super::event::SseEvent;
use crate::error::SessionError;
use crate::protocol::{JsonRpcMessage, ServerInfo};
use crate::server::McpServer;
use crate::tools::ToolRegistry;

/// Server-generated session identifier
pub type SessionId = String;

/// Exclusive handle on a session's protocol server.
///
/// Holding the lock is what serializes requests within one session.
pub type ServerHandle = Arc<Mutex<McpServer>>;

/// Default idle time after which a session expires
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default period between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct Session {
    server: ServerHandle,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

/// Diagnostic snapshot of one session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub idle_for: Duration,
    pub connections: usize,
}

/// Owns every live session and its protocol server
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    connections: Arc<SseConnectionManager>,
    tools: Arc<ToolRegistry>,
    server_info: ServerInfo,
    timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        server_info: ServerInfo,
        tools: Arc<ToolRegistry>,
        connections: Arc<SseConnectionManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            connections,
            tools,
            server_info,
            timeout,
        }
    }

    /// Generate a new session ID
    fn generate_session_id() -> SessionId {
        Uuid::new_v4().simple().to_string()
    }

    /// Create a session with a fresh server instance
    pub fn create_session(&self) -> (SessionId, ServerHandle) {
        let server = Arc::new(Mutex::new(McpServer::new(
            self.server_info.clone(),
            Arc::clone(&self.tools),
        )));

        let mut sessions = self.sessions.write();
        let mut session_id = Self::generate_session_id();
        while sessions.contains_key(&session_id) {
            session_id = Self::generate_session_id();
        }
        sessions.insert(
            session_id.clone(),
            Session {
                server: Arc::clone(&server),
                created_at: Utc::now(),
                last_activity: Instant::now(),
            },
        );
        drop(sessions);

        info!(session_id = %session_id, "Session created");
        (session_id, server)
    }

    /// Resolve a live session's server. Does not count as activity.
    pub fn lookup(&self, session_id: &str) -> Result<ServerHandle, SessionError> {
        let now = Instant::now();
        self.sessions
            .read()
            .get(session_id)
            .filter(|s| !self.is_expired(s, now))
            .map(|s| Arc::clone(&s.server))
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Record activity on a session; unknown ids are ignored
    pub fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Remove a session and close all its streams.
    ///
    /// Returns whether the session existed; terminating twice is harmless.
    pub fn terminate(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.remove(session_id) {
            Some(_) => {
                let closed = self.connections.terminate_session(session_id);
                drop(sessions);
                info!(session_id, closed_streams = closed, "Session terminated");
                true
            }
            None => false,
        }
    }

    /// Terminate every session; used on shutdown so open streams end
    pub fn terminate_all(&self) -> usize {
        let mut sessions = self.sessions.write();
        let count = sessions.len();
        for (session_id, _) in sessions.drain() {
            self.connections.terminate_session(&session_id);
        }
        count
    }

    /// Terminate every session idle for longer than the timeout at `now`.
    /// Returns how many sessions were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write();
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| self.is_expired(s, now))
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            sessions.remove(session_id);
            let closed = self.connections.terminate_session(session_id);
            debug!(session_id = %session_id, closed_streams = closed, "Session expired");
        }
        expired.len()
    }

    /// Run `sweep` every `interval` until the registry is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let removed = registry.sweep(Instant::now());
                if removed > 0 {
                    info!(removed, remaining = registry.session_count(), "Expired sessions swept");
                }
            }
        })
    }

    /// Open an SSE stream for a live session
    pub fn open_connection(
        &self,
        session_id: &str,
        capacity: Option<usize>,
    ) -> Result<(ConnectionId, SseChannel), SessionError> {
        let now = Instant::now();
        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(s) if !self.is_expired(s, now) => Ok(match capacity {
                Some(capacity) => self.connections.register_with_capacity(session_id, capacity),
                None => self.connections.register(session_id),
            }),
            _ => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    /// Push a server-initiated message to every open stream of a session.
    /// Returns how many streams accepted it.
    /// Expired sessions receive nothing, swept or not.
    pub fn notify(&self, session_id: &str, message: &JsonRpcMessage) -> usize {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to serialize notification");
                return 0;
            }
        };

        let now = Instant::now();
        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(s) if !self.is_expired(s, now) => {
                self.connections.broadcast(session_id, &SseEvent::message(json))
            }
            _ => 0,
        }
    }

    /// Number of live (unexpired) sessions
    pub fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .values()
            .filter(|s| !self.is_expired(s, now))
            .count()
    }

    pub fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let now = Instant::now();
        let sessions = self.sessions.read();
        let session = sessions.get(session_id)?;
        Some(SessionInfo {
            session_id: session_id.to_string(),
            created_at: session.created_at,
            idle_for: now.saturating_duration_since(session.last_activity),
            connections: self.connections.connection_ids(session_id).len(),
        })
    }

    pub fn connections(&self) -> &Arc<SseConnectionManager> {
        &self.connections
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_activity) > self.timeout
    }
}
