//! Session-channel message types
//!
//! Outbound frames carry a server-assigned timestamp and, for unicast
//! replies, the id of the session they belong to. Inbound frames only
//! contribute `kind` and `payload`; anything else a client sends is dropped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Message kind on the session channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Ping,
    Pong,
    Data,
    Broadcast,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Data => "data",
            MessageKind::Broadcast => "broadcast",
            MessageKind::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ping" => Some(MessageKind::Ping),
            "pong" => Some(MessageKind::Pong),
            "data" => Some(MessageKind::Data),
            "broadcast" => Some(MessageKind::Broadcast),
            "error" => Some(MessageKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Frame received from a client, before classification
///
/// `kind` stays a string here so an unrecognized kind can be reported back
/// by name instead of failing the whole parse. The older `type` / `data`
/// field names are accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
}

/// Frame exchanged with a session, after stamping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_session_id: Option<String>,
}

impl SessionMessage {
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
            origin_session_id: None,
        }
    }

    pub fn with_origin(mut self, session_id: impl Into<String>) -> Self {
        self.origin_session_id = Some(session_id.into());
        self
    }

    /// First message a session receives after the handshake
    pub fn connected(session_id: &str) -> Self {
        Self::new(
            MessageKind::Data,
            json!({ "action": "connected", "session_id": session_id }),
        )
        .with_origin(session_id)
    }

    /// Heartbeat probe
    pub fn ping() -> Self {
        let now = Utc::now();
        Self {
            kind: MessageKind::Ping,
            payload: json!({ "timestamp": now }),
            timestamp: now,
            origin_session_id: None,
        }
    }

    /// Reply to a client PING
    pub fn pong() -> Self {
        let now = Utc::now();
        Self {
            kind: MessageKind::Pong,
            payload: json!({ "timestamp": now }),
            timestamp: now,
            origin_session_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, json!({ "error": message.into() }))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            MessageKind::Ping,
            MessageKind::Pong,
            MessageKind::Data,
            MessageKind::Broadcast,
            MessageKind::Error,
        ] {
            assert_eq!(MessageKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_str("PING"), None);
        assert_eq!(MessageKind::from_str("subscribe"), None);
    }

    #[test]
    fn test_inbound_frame_accepts_legacy_field_names() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"data","data":{"x":1}}"#).unwrap();
        assert_eq!(frame.kind, "data");
        assert_eq!(frame.payload, json!({"x": 1}));

        let frame: InboundFrame = serde_json::from_str(r#"{"kind":"ping"}"#).unwrap();
        assert_eq!(frame.kind, "ping");
        assert!(frame.payload.is_null());
    }

    #[test]
    fn test_inbound_frame_ignores_client_stamps() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"kind":"data","payload":1,"timestamp":"1999-01-01T00:00:00Z","origin_session_id":"spoofed"}"#,
        )
        .unwrap();
        assert_eq!(frame.kind, "data");
        assert_eq!(frame.payload, json!(1));
    }

    #[test]
    fn test_connected_message_shape() {
        let msg = SessionMessage::connected("abc");
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "data");
        assert_eq!(json["payload"]["action"], "connected");
        assert_eq!(json["payload"]["session_id"], "abc");
        assert_eq!(json["origin_session_id"], "abc");
    }

    #[test]
    fn test_outbound_omits_missing_origin() {
        let json: Value = serde_json::to_value(SessionMessage::ping()).unwrap();
        assert_eq!(json["kind"], "ping");
        assert!(json.get("origin_session_id").is_none());
        assert!(json["payload"]["timestamp"].is_string());
    }
}
