//! JSON-RPC server
//!
//! Accepts one JSON-RPC 2.0 request per `POST /rpc` body on its own
//! listener. Protocol failures are reported in the response body with
//! HTTP 200, as the JSON-RPC convention expects.
//!
//! `POST /rpc/stream` takes the same request shape for streaming methods
//! and answers with newline-delimited JSON, one success response per item.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use super::protocol::{RequestId, RpcError, RpcRequest, RpcResponse};
use super::service::RpcHandler;
use crate::config::RpcServerConfig;
use crate::error::{PolyportError, Result};

const NDJSON: &str = "application/x-ndjson";

/// JSON-RPC server bound to its own port
pub struct RpcServer<H: RpcHandler + 'static> {
    config: RpcServerConfig,
    handler: Arc<H>,
}

impl<H: RpcHandler + 'static> RpcServer<H> {
    pub fn new(config: RpcServerConfig, handler: H) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/rpc", post(rpc_endpoint::<H>))
            .route("/rpc/stream", post(rpc_stream_endpoint::<H>))
            .layer(TraceLayer::new_for_http())
            .with_state(self.handler.clone())
    }

    /// Bind the configured address and run until `shutdown` flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                PolyportError::InvalidConfig(format!(
                    "Invalid RPC address {}:{}",
                    self.config.host, self.config.port
                ))
            })?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("RPC server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| PolyportError::Internal(e.to_string()))?;

        info!("RPC server shut down");
        Ok(())
    }
}

async fn rpc_stream_endpoint<H: RpcHandler + 'static>(
    State(handler): State<Arc<H>>,
    body: String,
) -> Response {
    match handle_stream_message(&body, handler.as_ref()).await {
        Ok(lines) => {
            debug!(items = lines.len(), "Streaming RPC response");
            let body = Body::from_stream(stream::iter(lines.into_iter().map(Ok::<_, Infallible>)));
            ([(header::CONTENT_TYPE, NDJSON)], body).into_response()
        }
        Err(response) => Json(response).into_response(),
    }
}

async fn rpc_endpoint<H: RpcHandler + 'static>(
    State(handler): State<Arc<H>>,
    body: String,
) -> Response {
    match handle_message(&body, handler.as_ref()).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Decode, validate and execute one request
///
/// Returns `None` for notifications, which get no response.
pub async fn handle_message<H: RpcHandler + ?Sized>(text: &str, handler: &H) -> Option<RpcResponse> {
    let request = match parse_request(text) {
        Ok(request) => request,
        Err(response) => return Some(response),
    };

    let result = handler.handle_request(&request.method, request.params).await;

    let Some(id) = request.id else {
        if let Err(e) = result {
            warn!(method = %request.method, "Notification failed: {}", e);
        }
        return None;
    };

    Some(match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => RpcResponse::error(Some(id), e),
    })
}

/// Decode, validate and execute one streaming request
///
/// On success every item becomes one newline-terminated success response
/// carrying the request id. Failures before the first item come back as a
/// single error response.
pub async fn handle_stream_message<H: RpcHandler + ?Sized>(
    text: &str,
    handler: &H,
) -> std::result::Result<Vec<String>, RpcResponse> {
    let request = parse_request(text)?;

    let Some(id) = request.id else {
        return Err(RpcResponse::error(
            None,
            RpcError::invalid_request("Streaming calls need an id"),
        ));
    };

    let items = handler
        .handle_stream(&request.method, request.params)
        .await
        .map_err(|e| RpcResponse::error(Some(id.clone()), e))?;

    items
        .into_iter()
        .map(|item| {
            serde_json::to_string(&RpcResponse::success(id.clone(), item))
                .map(|mut line| {
                    line.push('\n');
                    line
                })
                .map_err(|e| RpcResponse::error(Some(id.clone()), RpcError::internal(e.to_string())))
        })
        .collect()
}

fn parse_request(text: &str) -> std::result::Result<RpcRequest, RpcResponse> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| {
        debug!("Unparsable RPC body: {}", e);
        RpcResponse::error(None, RpcError::parse_error("Failed to parse JSON"))
    })?;

    // Best-effort id so shape errors can still be correlated
    let id: Option<RequestId> = parsed
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());

    let invalid = || {
        RpcResponse::error(
            id.clone(),
            RpcError::invalid_request("Invalid JSON-RPC 2.0 request"),
        )
    };

    let request: RpcRequest = serde_json::from_value(parsed).map_err(|_| invalid())?;
    if !request.is_valid() {
        return Err(invalid());
    }

    Ok(request)
}
