//! Live SSE connection tracking
//!
//! The manager owns the sending half of every connection's bounded channel.
//! Dropping that sender is what closes a stream, so `unregister` and
//! `terminate_session` end the HTTP response once buffered events drain.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::SseEvent;

/// Identifier of one SSE connection
pub type ConnectionId = String;

/// Default number of events buffered per connection
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

struct ConnectionEntry {
    session_id: String,
    sender: mpsc::Sender<SseEvent>,
    created_at: DateTime<Utc>,
    next_event_id: AtomicU64,
}

#[derive(Default)]
struct Connections {
    by_id: HashMap<ConnectionId, ConnectionEntry>,
    by_session: HashMap<String, HashSet<ConnectionId>>,
}

impl Connections {
    fn remove(&mut self, connection_id: &str) -> Option<ConnectionEntry> {
        let entry = self.by_id.remove(connection_id)?;
        if let Some(ids) = self.by_session.get_mut(&entry.session_id) {
            ids.remove(connection_id);
            if ids.is_empty() {
                self.by_session.remove(&entry.session_id);
            }
        }
        Some(entry)
    }
}

/// Registry of open SSE connections, grouped by session
pub struct SseConnectionManager {
    connections: RwLock<Connections>,
    capacity: usize,
}

impl SseConnectionManager {
    /// Create a manager whose channels buffer `capacity` events
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            connections: RwLock::new(Connections::default()),
            capacity: capacity.max(1),
        })
    }

    /// Open a connection for `session_id` with the default capacity
    pub fn register(self: &Arc<Self>, session_id: &str) -> (ConnectionId, SseChannel) {
        self.register_with_capacity(session_id, self.capacity)
    }

    /// Open a connection whose channel buffers `capacity` events
    pub fn register_with_capacity(
        self: &Arc<Self>,
        session_id: &str,
        capacity: usize,
    ) -> (ConnectionId, SseChannel) {
        let connection_id = Uuid::new_v4().simple().to_string();
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let entry = ConnectionEntry {
            session_id: session_id.to_string(),
            sender,
            created_at: Utc::now(),
            next_event_id: AtomicU64::new(0),
        };

        {
            let mut conns = self.connections.write();
            conns.by_id.insert(connection_id.clone(), entry);
            conns
                .by_session
                .entry(session_id.to_string())
                .or_default()
                .insert(connection_id.clone());
        }
        debug!(connection_id = %connection_id, session_id, "SSE connection registered");

        let channel = SseChannel {
            connection_id: connection_id.clone(),
            session_id: session_id.to_string(),
            receiver,
            manager: Arc::downgrade(self),
        };
        (connection_id, channel)
    }

    /// Queue an event on one connection without waiting.
    ///
    /// Events without an id get the connection's next sequence number.
    /// Returns false if the connection is gone or its buffer is full; the
    /// event is dropped in both cases.
    pub fn push(&self, connection_id: &str, event: SseEvent) -> bool {
        let conns = self.connections.read();
        match conns.by_id.get(connection_id) {
            Some(entry) => Self::try_push(connection_id, entry, event),
            None => false,
        }
    }

    /// Queue an event on every connection of a session; returns how many accepted it
    pub fn broadcast(&self, session_id: &str, event: &SseEvent) -> usize {
        let conns = self.connections.read();
        let Some(ids) = conns.by_session.get(session_id) else {
            return 0;
        };
        ids.iter()
            .filter_map(|id| conns.by_id.get(id).map(|entry| (id, entry)))
            .filter(|(id, entry)| Self::try_push(id, entry, event.clone()))
            .count()
    }

    fn try_push(connection_id: &str, entry: &ConnectionEntry, mut event: SseEvent) -> bool {
        if event.id.is_none() {
            let seq = entry.next_event_id.fetch_add(1, Ordering::SeqCst);
            event.id = Some(seq.to_string());
        }
        match entry.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id, "SSE buffer full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id, "SSE channel closed, dropping event");
                false
            }
        }
    }

    /// Close and forget a connection. Returns false if it was not registered.
    pub fn unregister(&self, connection_id: &str) -> bool {
        let removed = self.connections.write().remove(connection_id);
        match removed {
            Some(entry) => {
                debug!(
                    connection_id,
                    session_id = %entry.session_id,
                    open_for_secs = (Utc::now() - entry.created_at).num_seconds(),
                    "SSE connection unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Snapshot of a session's connection ids
    pub fn connection_ids(&self, session_id: &str) -> Vec<ConnectionId> {
        self.connections
            .read()
            .by_session
            .get(session_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Unregister every connection of a session; returns how many were closed
    pub fn terminate_session(&self, session_id: &str) -> usize {
        let mut conns = self.connections.write();
        let Some(ids) = conns.by_session.remove(session_id) else {
            return 0;
        };
        ids.iter().filter(|id| conns.by_id.remove(*id).is_some()).count()
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.read().by_id.len()
    }

    /// Buffer size used by `register`
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Receiving half of one SSE connection.
///
/// Dropping it (for example when the peer disconnects and hyper drops the
/// response body) unregisters the connection.
pub struct SseChannel {
    connection_id: ConnectionId,
    session_id: String,
    receiver: mpsc::Receiver<SseEvent>,
    manager: Weak<SseConnectionManager>,
}

impl SseChannel {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next queued event; `None` once the connection is closed and drained
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.receiver.recv().await
    }

    /// Turn the channel into an HTTP body stream of wire frames.
    ///
    /// A keep-alive comment is emitted whenever no event arrives within
    /// `heartbeat`. The stream ends when the connection is closed.
    pub fn into_stream(
        mut self,
        heartbeat: Duration,
    ) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
        async_stream::stream! {
            loop {
                match tokio::time::timeout(heartbeat, self.recv()).await {
                    Ok(Some(event)) => yield Ok::<_, Infallible>(event.to_wire()),
                    Ok(None) => break,
                    Err(_) => yield Ok(SseEvent::keep_alive().to_string()),
                }
            }
        }
    }
}

impl Drop for SseChannel {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.unregister(&self.connection_id);
        }
    }
}
