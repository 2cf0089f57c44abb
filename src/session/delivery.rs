//! Unicast and broadcast delivery
//!
//! A failed write is terminal for the session it happened on. Broadcast
//! sends to everyone first and only then unregisters the recipients that
//! failed, so one dead connection never holds up the rest.

use futures::future::join_all;
use tracing::{debug, error, warn};

use super::registry::{ConnectionManager, SessionId};
use crate::models::{MessageKind, SessionMessage};

/// Result of a unicast send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Written to the transport
    Sent,
    /// The session was not registered; nothing was written
    SessionGone,
    /// Nothing was written; a transport failure also unregistered the
    /// session, a serialization failure leaves it registered
    Failed,
}

/// Summary of one broadcast pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<SessionId>,
}

impl ConnectionManager {
    /// Send `message` to one session
    pub async fn deliver(&self, message: SessionMessage, session_id: &str) -> DeliveryOutcome {
        let Some(transport) = self.transport(session_id) else {
            debug!(session_id, kind = %message.kind, "Session gone, dropping message");
            return DeliveryOutcome::SessionGone;
        };

        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!(session_id, "Failed to serialize {} message: {}", message.kind, e);
                return DeliveryOutcome::Failed;
            }
        };

        match transport.send_text(text).await {
            Ok(()) => DeliveryOutcome::Sent,
            Err(e) => {
                warn!(session_id, "Failed to send {} message: {}", message.kind, e);
                self.unregister(session_id);
                DeliveryOutcome::Failed
            }
        }
    }

    /// Send `message` as a BROADCAST to every session except `excluding`
    pub async fn broadcast(
        &self,
        mut message: SessionMessage,
        excluding: Option<&str>,
    ) -> BroadcastReport {
        message.kind = MessageKind::Broadcast;
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize broadcast message: {}", e);
                return BroadcastReport::default();
            }
        };

        let recipients: Vec<SessionId> = self
            .list_ids()
            .into_iter()
            .filter(|id| Some(id.as_str()) != excluding)
            .collect();

        let sends = recipients.into_iter().map(|id| {
            let text = text.clone();
            async move {
                // Looked up per recipient so a session removed since the
                // snapshot is skipped rather than written to
                let Some(transport) = self.transport(&id) else {
                    return (id, None);
                };
                let result = transport.send_text(text).await;
                (id, Some(result))
            }
        });

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(sends).await {
            match result {
                Some(Ok(())) => report.delivered += 1,
                Some(Err(e)) => {
                    warn!(session_id = %id, "Failed to broadcast message: {}", e);
                    report.failed.push(id);
                }
                None => {}
            }
        }

        for id in &report.failed {
            self.unregister(id);
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "Broadcast complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebSocketConfig;
    use crate::session::testing::{FailingTransport, FlakyTransport, RecordingTransport};
    use serde_json::json;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(&WebSocketConfig::default())
    }

    #[tokio::test]
    async fn test_deliver_to_unknown_session_is_noop() {
        let manager = manager();
        let outcome = manager
            .deliver(SessionMessage::pong(), "missing")
            .await;
        assert_eq!(outcome, DeliveryOutcome::SessionGone);
    }

    #[tokio::test]
    async fn test_deliver_failure_unregisters() {
        let manager = manager();
        let transport = FlakyTransport::failing_after(1);
        let id = manager.register(transport).await;
        assert!(manager.contains(&id));

        let outcome = manager.deliver(SessionMessage::pong(), &id).await;
        assert_eq!(outcome, DeliveryOutcome::Failed);
        assert!(!manager.contains(&id));
        assert_eq!(manager.active_heartbeats(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_origin() {
        let manager = manager();
        let a = RecordingTransport::new();
        let b = RecordingTransport::new();
        let c = RecordingTransport::new();
        let a_id = manager.register(a.clone()).await;
        manager.register(b.clone()).await;
        manager.register(c.clone()).await;

        let message = SessionMessage::new(MessageKind::Data, json!({"hello": "world"}));
        let report = manager.broadcast(message, Some(&a_id)).await;

        assert_eq!(report.delivered, 2);
        assert!(report.failed.is_empty());
        assert_eq!(a.sent_count(), 1);
        for t in [&b, &c] {
            let last = t.messages().pop().unwrap();
            assert_eq!(last.kind, MessageKind::Broadcast);
            assert_eq!(last.payload, json!({"hello": "world"}));
        }
    }

    #[tokio::test]
    async fn test_broadcast_isolates_broken_recipient() {
        let manager = manager();
        let healthy: Vec<RecordingTransport> =
            (0..3).map(|_| RecordingTransport::new()).collect();
        for t in &healthy {
            manager.register(t.clone()).await;
        }
        // Confirmation succeeds, everything after fails
        let broken_id = manager.register(FlakyTransport::failing_after(1)).await;
        assert_eq!(manager.count(), 4);

        let report = manager
            .broadcast(SessionMessage::new(MessageKind::Data, json!(1)), None)
            .await;
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, vec![broken_id.clone()]);
        assert!(!manager.contains(&broken_id));
        assert_eq!(manager.count(), 3);

        let report = manager
            .broadcast(SessionMessage::new(MessageKind::Data, json!(2)), None)
            .await;
        assert_eq!(report.delivered, 3);
        assert!(report.failed.is_empty());
        for t in &healthy {
            let broadcasts = t
                .messages()
                .into_iter()
                .filter(|m| m.kind == MessageKind::Broadcast)
                .count();
            assert_eq!(broadcasts, 2);
        }
    }

    #[tokio::test]
    async fn test_broadcast_with_no_recipients() {
        let manager = manager();
        let report = manager
            .broadcast(SessionMessage::new(MessageKind::Data, json!(null)), None)
            .await;
        assert_eq!(report, BroadcastReport::default());

        // A session whose confirmation failed never receives anything
        let failing = FailingTransport::new();
        manager.register(failing.clone()).await;
        manager
            .broadcast(SessionMessage::new(MessageKind::Data, json!(null)), None)
            .await;
        assert_eq!(failing.attempts(), 1);
    }
}
