//! API route definitions

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/status", get(handlers::health::status))
        // Session channel
        .route("/ws/connect", get(websocket::session::session_ws))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Records
        .route(
            "/data",
            get(handlers::record::list_records).post(handlers::record::create_record),
        )
        .route(
            "/data/:id",
            get(handlers::record::get_record)
                .put(handlers::record::update_record)
                .delete(handlers::record::delete_record),
        )
        // Sessions
        .route("/sessions", get(handlers::session::list_sessions))
}
