//! API server using Axum
//!
//! Serves the record REST API, the status endpoints and the WebSocket
//! session channel on one listener.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::{Config, HttpServerConfig};
use crate::error::{PolyportError, Result};
use crate::repository::RecordRepository;
use crate::session::ConnectionManager;

use super::middleware::{cors_layer, RequestLogging};
use super::routes;

/// Upper bound for a plain HTTP request; upgraded sockets are not affected
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub records: RecordRepository,
    pub sessions: ConnectionManager,
    pub started_at: Instant,
}

/// API server
pub struct ApiServer {
    config: HttpServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        full_config: Config,
        records: RecordRepository,
        sessions: ConnectionManager,
    ) -> Self {
        let state = AppState {
            config: full_config.clone(),
            records,
            sessions,
            started_at: Instant::now(),
        };

        Self {
            config: full_config.http,
            state,
        }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone())
            .layer(middleware::from_fn(RequestLogging::log_request))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and run until `shutdown` flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                PolyportError::InvalidConfig(format!(
                    "Invalid HTTP address {}:{}",
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
        let router = self.build_router();

        info!("API server listening on {}", listener.local_addr()?);
        info!(
            "WebSocket endpoint: ws://{}/ws/connect",
            listener.local_addr()?
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| PolyportError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
