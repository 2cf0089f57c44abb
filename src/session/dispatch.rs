//! Inbound frame dispatch and the per-session receive loop
//!
//! Each frame is handled on its own: decode, stamp with the receive time
//! and the sender's id, then route on kind. Anything that goes wrong while
//! handling a frame becomes an ERROR reply to the sender; only a close or a
//! receive failure ends the loop.

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::registry::ConnectionManager;
use super::transport::{InboundEvent, TransportError};
use crate::models::{InboundFrame, MessageKind, SessionMessage};

/// Frame-level problem; reported to the sender, never fatal
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(std::string::FromUtf8Error),

    #[error("Invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(serde_json::Error),

    #[error("Unknown message kind: {0}")]
    UnknownKind(String),

    #[error("Unsupported message kind: {0}")]
    UnsupportedKind(MessageKind),
}

/// Parse a raw frame and stamp it with server-side metadata
///
/// Client-supplied `timestamp` and `origin_session_id` never survive.
pub fn decode_frame(
    raw: &str,
    session_id: &str,
    received_at: DateTime<Utc>,
) -> Result<SessionMessage, ProtocolError> {
    let frame: InboundFrame = serde_json::from_str(raw).map_err(|e| {
        if e.is_data() {
            ProtocolError::MalformedFrame(e)
        } else {
            ProtocolError::InvalidJson(e)
        }
    })?;

    let kind = MessageKind::from_str(&frame.kind)
        .ok_or_else(|| ProtocolError::UnknownKind(frame.kind.clone()))?;

    Ok(SessionMessage {
        kind,
        payload: frame.payload,
        timestamp: received_at,
        origin_session_id: Some(session_id.to_string()),
    })
}

impl ConnectionManager {
    /// Handle one inbound frame from `session_id`
    pub async fn dispatch(&self, session_id: &str, raw: &str) {
        let received_at = Utc::now();

        if let Err(e) = self.route_frame(session_id, raw, received_at).await {
            self.reject(session_id, e).await;
        }
    }

    /// Handle one binary frame; only UTF-8 text is accepted
    pub async fn dispatch_binary(&self, session_id: &str, bytes: Vec<u8>) {
        match String::from_utf8(bytes) {
            Ok(raw) => self.dispatch(session_id, &raw).await,
            Err(e) => self.reject(session_id, ProtocolError::InvalidEncoding(e)).await,
        }
    }

    async fn reject(&self, session_id: &str, error: ProtocolError) {
        debug!(session_id, "Rejected frame: {}", error);
        let reply = SessionMessage::error(error.to_string()).with_origin(session_id);
        self.deliver(reply, session_id).await;
    }

    async fn route_frame(
        &self,
        session_id: &str,
        raw: &str,
        received_at: DateTime<Utc>,
    ) -> Result<(), ProtocolError> {
        let message = decode_frame(raw, session_id, received_at)?;

        match message.kind {
            MessageKind::Ping => {
                let reply = SessionMessage::pong().with_origin(session_id);
                self.deliver(reply, session_id).await;
            }
            MessageKind::Data => {
                let now = Utc::now();
                let reply = SessionMessage::new(
                    MessageKind::Data,
                    json!({
                        "received": message.payload,
                        "processed_at": now,
                        "session_count": self.count(),
                    }),
                )
                .with_origin(session_id);
                self.deliver(reply, session_id).await;
            }
            MessageKind::Broadcast => {
                let relay = SessionMessage::new(
                    MessageKind::Broadcast,
                    broadcast_payload(session_id, message.payload),
                )
                .with_origin(session_id);
                self.broadcast(relay, Some(session_id)).await;
            }
            MessageKind::Pong | MessageKind::Error => {
                return Err(ProtocolError::UnsupportedKind(message.kind));
            }
        }

        Ok(())
    }

    /// Drive one session until the client leaves or the session is torn down
    ///
    /// Frames are handled strictly in arrival order. The session is always
    /// unregistered on exit.
    pub async fn run_session<S>(&self, session_id: &str, mut inbound: S)
    where
        S: Stream<Item = Result<InboundEvent, TransportError>> + Unpin,
    {
        let Some(mut closed) = self.closed_signal(session_id) else {
            debug!(session_id, "Session already gone before receive loop");
            return;
        };

        loop {
            let event = tokio::select! {
                _ = closed.wait_for(|c| *c) => {
                    debug!(session_id, "Session torn down, leaving receive loop");
                    break;
                }
                event = inbound.next() => event,
            };

            match event {
                Some(Ok(InboundEvent::Frame(raw))) => self.dispatch(session_id, &raw).await,
                Some(Ok(InboundEvent::Binary(bytes))) => {
                    self.dispatch_binary(session_id, bytes).await
                }
                Some(Ok(InboundEvent::Close)) | None => {
                    info!(session_id, "Client closed the connection");
                    break;
                }
                Some(Err(e)) => {
                    warn!(session_id, "Receive failed: {}", e);
                    break;
                }
            }
        }

        self.unregister(session_id);
    }
}

fn broadcast_payload(origin: &str, message: Value) -> Value {
    json!({
        "origin_session_id": origin,
        "message": message,
        "timestamp": Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebSocketConfig;
    use crate::session::testing::{FlakyTransport, RecordingTransport};
    use futures::stream;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(&WebSocketConfig::default())
    }

    async fn connected(manager: &ConnectionManager) -> (String, RecordingTransport) {
        let transport = RecordingTransport::new();
        let id = manager.register(transport.clone()).await;
        transport.clear();
        (id, transport)
    }

    #[test]
    fn test_decode_overwrites_client_stamps() {
        let received_at = Utc::now();
        let message = decode_frame(
            r#"{"kind":"data","payload":{"n":1},"timestamp":"2000-01-01T00:00:00Z","origin_session_id":"evil"}"#,
            "real",
            received_at,
        )
        .unwrap();

        assert_eq!(message.kind, MessageKind::Data);
        assert_eq!(message.timestamp, received_at);
        assert_eq!(message.origin_session_id.as_deref(), Some("real"));
        assert_eq!(message.payload, json!({"n": 1}));
    }

    #[test]
    fn test_decode_classifies_failures() {
        let now = Utc::now();
        assert!(matches!(
            decode_frame("{not json", "s", now),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"payload":1}"#, "s", now),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"kind":"subscribe"}"#, "s", now),
            Err(ProtocolError::UnknownKind(k)) if k == "subscribe"
        ));
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        let before = Utc::now();
        manager.dispatch(&id, r#"{"kind":"ping"}"#).await;

        let replies = transport.messages();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, MessageKind::Pong);
        assert!(replies[0].timestamp >= before);
        assert_eq!(replies[0].origin_session_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_data_is_echoed_with_session_count() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;
        connected(&manager).await;

        manager
            .dispatch(&id, r#"{"kind":"data","payload":{"temp":21.5}}"#)
            .await;

        let replies = transport.messages();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, MessageKind::Data);
        assert_eq!(replies[0].payload["received"], json!({"temp": 21.5}));
        assert_eq!(replies[0].payload["session_count"], 2);
        assert!(replies[0].payload["processed_at"].is_string());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_but_sender() {
        let manager = manager();
        let (a_id, a) = connected(&manager).await;
        let (_, b) = connected(&manager).await;
        let (_, c) = connected(&manager).await;

        manager
            .dispatch(&a_id, r#"{"kind":"broadcast","payload":"hi all"}"#)
            .await;

        assert_eq!(a.sent_count(), 0);
        for t in [&b, &c] {
            let received = t.messages();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].kind, MessageKind::Broadcast);
            assert_eq!(received[0].payload["origin_session_id"], a_id.as_str());
            assert_eq!(received[0].payload["message"], "hi all");
            assert!(received[0].payload["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_yields_one_error() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        manager.dispatch(&id, "definitely not json").await;

        let replies = transport.messages();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, MessageKind::Error);
        assert!(replies[0].payload["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON"));
        assert!(manager.contains(&id));
    }

    #[tokio::test]
    async fn test_binary_frames_must_be_utf8() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        manager
            .dispatch_binary(&id, br#"{"kind":"ping"}"#.to_vec())
            .await;

        // Invalid byte inside a JSON string is rejected, not replaced
        let mut bad = br#"{"kind":"data","payload":"x"#.to_vec();
        bad.push(0xff);
        bad.extend_from_slice(br#""}"#);
        manager.dispatch_binary(&id, bad).await;

        let replies = transport.messages();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].kind, MessageKind::Pong);
        assert_eq!(replies[1].kind, MessageKind::Error);
        assert!(replies[1].payload["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid encoding"));
        assert!(manager.contains(&id));
    }

    #[tokio::test]
    async fn test_unknown_and_unsupported_kinds_are_named() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        manager.dispatch(&id, r#"{"kind":"subscribe"}"#).await;
        manager.dispatch(&id, r#"{"kind":"pong"}"#).await;

        let errors: Vec<String> = transport
            .messages()
            .into_iter()
            .map(|m| {
                assert_eq!(m.kind, MessageKind::Error);
                m.payload["error"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            errors,
            vec![
                "Unknown message kind: subscribe".to_string(),
                "Unsupported message kind: pong".to_string(),
            ]
        );
        assert!(manager.contains(&id));
    }

    #[tokio::test]
    async fn test_receive_loop_processes_in_order_then_unregisters() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        let inbound = stream::iter(vec![
            Ok(InboundEvent::Frame(r#"{"kind":"ping"}"#.to_string())),
            Ok(InboundEvent::Frame("oops".to_string())),
            Ok(InboundEvent::Binary(vec![0xc3, 0x28])),
            Ok(InboundEvent::Frame(r#"{"kind":"data","payload":3}"#.to_string())),
            Ok(InboundEvent::Close),
            Ok(InboundEvent::Frame(r#"{"kind":"ping"}"#.to_string())),
        ]);
        manager.run_session(&id, inbound).await;

        assert_eq!(
            transport.kinds(),
            vec![
                MessageKind::Pong,
                MessageKind::Error,
                MessageKind::Error,
                MessageKind::Data
            ]
        );
        assert!(!manager.contains(&id));
    }

    #[tokio::test]
    async fn test_receive_error_ends_loop() {
        let manager = manager();
        let (id, transport) = connected(&manager).await;

        let inbound = stream::iter(vec![
            Err(TransportError::Receive("reset by peer".to_string())),
            Ok(InboundEvent::Frame(r#"{"kind":"ping"}"#.to_string())),
        ]);
        manager.run_session(&id, inbound).await;

        assert_eq!(transport.sent_count(), 0);
        assert!(!manager.contains(&id));
    }

    #[tokio::test]
    async fn test_receive_loop_stops_when_session_evicted() {
        let manager = manager();
        // Confirmation and the first reply succeed, the second reply fails
        let id = manager.register(FlakyTransport::failing_after(2)).await;

        let inbound = stream::iter(vec![
            Ok(InboundEvent::Frame(r#"{"kind":"ping"}"#.to_string())),
            Ok(InboundEvent::Frame(r#"{"kind":"ping"}"#.to_string())),
        ])
        .chain(stream::pending());

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            manager.run_session(&id, inbound),
        )
        .await
        .expect("receive loop should end once the session is evicted");

        assert!(!manager.contains(&id));
    }

    #[tokio::test]
    async fn test_run_session_for_unknown_id_returns() {
        let manager = manager();
        manager
            .run_session("ghost", stream::pending::<Result<InboundEvent, TransportError>>())
            .await;
        assert_eq!(manager.count(), 0);
    }
}
