//! Session channel WebSocket handler
//!
//! Every accepted socket becomes one registered session. The write half is
//! handed to the registry as a [`WsTransport`]; the read half feeds the
//! session's receive loop.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::WS_SEND_TIMEOUT;
use crate::api::server::AppState;
use crate::session::{InboundEvent, Transport, TransportError};

/// WebSocket handler for the session channel
pub async fn session_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session_ws(socket, state))
}

/// Run one session from upgrade to close
async fn handle_session_ws(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    let transport = WsTransport::new(sender);

    let session_id = state.sessions.register(transport.clone()).await;
    info!(session_id = %session_id, "WebSocket session opened");

    state
        .sessions
        .run_session(&session_id, inbound_events(receiver))
        .await;

    transport.close().await;
    debug!(session_id = %session_id, "WebSocket session finished");
}

/// Write half of a socket
///
/// Every write, including the wait for the sink lock, is bounded by
/// [`WS_SEND_TIMEOUT`], so a peer that stops reading cannot park a sender.
pub struct WsTransport<S = SplitSink<WebSocket, Message>> {
    sink: Arc<Mutex<S>>,
}

impl<S> Clone for WsTransport<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S> WsTransport<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: fmt::Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Best-effort close frame; the peer may already be gone
    pub async fn close(&self) {
        if let Err(e) = self.write(Message::Close(None)).await {
            debug!("Close frame not delivered: {}", e);
        }
    }

    async fn write(&self, message: Message) -> Result<(), TransportError> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(message).await
        };

        match tokio::time::timeout(WS_SEND_TIMEOUT, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Send(e.to_string())),
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: fmt::Display,
{
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.write(Message::Text(text)).await
    }
}

/// Map raw socket messages onto session events
///
/// Control frames are answered by axum and never reach the session layer.
fn inbound_events(
    receiver: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<InboundEvent, TransportError>> + Unpin {
    receiver.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Text(text)) => Some(Ok(InboundEvent::Frame(text))),
            Ok(Message::Binary(bytes)) => Some(Ok(InboundEvent::Binary(bytes))),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Ok(Message::Close(_)) => Some(Ok(InboundEvent::Close)),
            Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
        })
    })
}
