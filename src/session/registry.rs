//! Session registry
//!
//! Single source of truth for who is connected. Each entry owns the
//! session's transport and its heartbeat task, so the two always come and
//! go together. All mutation happens under one mutex that is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use super::heartbeat::HeartbeatHandle;
use super::transport::Transport;
use crate::config::WebSocketConfig;
use crate::models::SessionMessage;

/// Opaque session identifier, a random UUID rendered as a string
pub type SessionId = String;

struct SessionEntry {
    transport: Arc<dyn Transport>,
    heartbeat: HeartbeatHandle,
}

struct Inner {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    heartbeat_interval: Duration,
}

/// Connection manager for the persistent session channel
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: &WebSocketConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                heartbeat_interval: config.heartbeat_interval,
            }),
        }
    }

    /// Register an accepted connection
    ///
    /// Allocates a fresh id, stores the transport, starts the heartbeat and
    /// sends the connection confirmation before returning. If that first
    /// send fails the session is already gone by the time this returns.
    pub async fn register<T>(&self, transport: T) -> SessionId
    where
        T: Transport + 'static,
    {
        let session_id = Uuid::new_v4().to_string();
        let transport: Arc<dyn Transport> = Arc::new(transport);

        {
            let mut sessions = self.inner.sessions.lock();
            let heartbeat = HeartbeatHandle::spawn(
                self.clone(),
                session_id.clone(),
                self.inner.heartbeat_interval,
            );
            sessions.insert(
                session_id.clone(),
                SessionEntry {
                    transport,
                    heartbeat,
                },
            );
        }

        info!(session_id = %session_id, "Session connected");

        self.deliver(SessionMessage::connected(&session_id), &session_id)
            .await;

        session_id
    }

    /// Remove a session, cancelling its heartbeat first
    ///
    /// Unknown ids are ignored. Returns whether a live session was removed.
    pub fn unregister(&self, session_id: &str) -> bool {
        let mut sessions = self.inner.sessions.lock();
        let Some(entry) = sessions.remove(session_id) else {
            return false;
        };

        entry.heartbeat.cancel();
        drop(entry.transport);
        let remaining = sessions.len();
        drop(sessions);

        info!(session_id = %session_id, remaining, "Session disconnected");
        true
    }

    /// Tear down every session; used on shutdown
    pub fn close_all(&self) -> usize {
        let drained: Vec<(SessionId, SessionEntry)> =
            self.inner.sessions.lock().drain().collect();
        let closed = drained.len();

        for (_, entry) in drained {
            entry.heartbeat.cancel();
        }

        if closed > 0 {
            info!(closed, "Closed all sessions");
        }
        closed
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Snapshot of live session ids
    pub fn list_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.lock().keys().cloned().collect()
    }

    /// Whether `session_id` is still registered
    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.sessions.lock().contains_key(session_id)
    }

    /// Number of sessions whose heartbeat task is still running
    pub fn active_heartbeats(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .values()
            .filter(|entry| entry.heartbeat.is_active())
            .count()
    }

    /// Receiver that flips to `true` when the session is torn down
    pub fn closed_signal(&self, session_id: &str) -> Option<watch::Receiver<bool>> {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .map(|entry| entry.heartbeat.subscribe())
    }

    pub(crate) fn transport(&self, session_id: &str) -> Option<Arc<dyn Transport>> {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .map(|entry| Arc::clone(&entry.transport))
    }
}
