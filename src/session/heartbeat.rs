//! Per-session heartbeat task
//!
//! Every registered session gets exactly one of these. The task sleeps for
//! the configured interval, checks the session is still registered, and
//! sends a PING. A failed probe tears the session down.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::delivery::DeliveryOutcome;
use super::registry::{ConnectionManager, SessionId};
use crate::models::SessionMessage;

/// Handle owned by the registry entry for one session's heartbeat
pub struct HeartbeatHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Start the heartbeat task for `session_id`
    pub(crate) fn spawn(
        manager: ConnectionManager,
        session_id: SessionId,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(manager, session_id, interval, shutdown_rx));
        Self { shutdown_tx, task }
    }

    /// Receiver that flips to `true` once the session is torn down
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Whether the task is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the task; no probe is sent after this returns
    pub(crate) fn cancel(self) {
        self.shutdown_tx.send_replace(true);
        // abort also covers a probe that is already parked in a send
        self.task.abort();
    }
}

#[instrument(skip(manager, shutdown), fields(session_id = %session_id))]
async fn run(
    manager: ConnectionManager,
    session_id: SessionId,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            // Err means the sender is gone, which also means torn down
            _ = shutdown.wait_for(|stop| *stop) => break,
            _ = tokio::time::sleep(interval) => {}
        }

        // The session may have been removed by an unrelated failed send
        if *shutdown.borrow() || !manager.contains(&session_id) {
            break;
        }

        let probe = SessionMessage::ping().with_origin(session_id.as_str());
        match manager.deliver(probe, &session_id).await {
            DeliveryOutcome::Sent => debug!("Heartbeat sent"),
            DeliveryOutcome::SessionGone => break,
            DeliveryOutcome::Failed => {
                warn!("Heartbeat failed, dropping session");
                manager.unregister(&session_id);
                break;
            }
        }
    }

    debug!("Heartbeat stopped");
}
