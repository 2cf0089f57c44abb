//! Transport seam between the session layer and the socket that carries it.

use async_trait::async_trait;
use thiserror::Error;

/// Failure on the wire; always terminal for the session it happened on
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("send timed out")]
    Timeout,

    #[error("receive failed: {0}")]
    Receive(String),
}

/// Outbound half of one session's connection
///
/// Owned by the registry entry; only the delivery layer writes through it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one text frame
    async fn send_text(&self, text: String) -> Result<(), TransportError>;
}

/// Inbound event surfaced by a connection's receive half
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One text frame, not yet parsed
    Frame(String),
    /// One binary frame; must hold UTF-8 JSON to be accepted
    Binary(Vec<u8>),
    /// The client asked to close
    Close,
}
