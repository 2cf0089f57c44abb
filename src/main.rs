//! Polyport - Entry Point
//!
//! Starts the HTTP/WebSocket server and the RPC server with graceful
//! shutdown support.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use polyport::api::ApiServer;
use polyport::config::{Config, LogConfig};
use polyport::repository::RecordRepository;
use polyport::rpc::{DataRpcService, RpcServer};
use polyport::session::ConnectionManager;

#[tokio::main]
async fn main() -> polyport::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);

    info!(
        "Starting {} v{} (debug: {})",
        config.app.name, config.app.version, config.app.debug
    );

    // Shared state
    let records = RecordRepository::new();
    let sessions = ConnectionManager::new(&config.websocket);

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    let api_server = ApiServer::new(config.clone(), records.clone(), sessions.clone());
    let rpc_server = RpcServer::new(config.rpc.clone(), DataRpcService::new(records.clone()));

    // Start servers
    let api_shutdown = shutdown_tx.subscribe();
    let rpc_shutdown = shutdown_tx.subscribe();

    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    let rpc_task = tokio::spawn(async move {
        if let Err(e) = rpc_server.run(rpc_shutdown).await {
            error!("RPC server error: {}", e);
        }
    });

    info!(
        "Servers started - HTTP/WebSocket: {}, RPC: {}",
        config.http_addr(),
        config.rpc_addr()
    );

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    // Stop accepting, then drop every live session and its heartbeat
    let _ = shutdown_tx.send(true);
    let closed = sessions.close_all();
    info!(closed, "Closed WebSocket sessions");

    // Wait for all tasks to complete
    let _ = tokio::join!(api_task, rpc_task);

    info!("Polyport stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over `LOG_LEVEL`
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("polyport={},tower_http=debug", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
