//! Root, status and health endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;
use crate::models::HealthStatus;

/// Plain-text greeting
pub async fn root() -> &'static str {
    "Hello World"
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthStatus::healthy([
            ("http", "running"),
            ("websocket", "running"),
            ("rpc", "running"),
        ])),
    )
}

/// Service status with live session count and public endpoints
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let http = &state.config.http;
    let base = format!("{}:{}", http.host, http.port);

    Json(json!({
        "app_name": state.config.app.name,
        "version": state.config.app.version,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "services": {
            "http": "running",
            "websocket": format!("running ({} connections)", state.sessions.count()),
            "rpc": format!("running on {}", state.config.rpc_addr()),
        },
        "endpoints": {
            "http_api": format!("http://{}/api", base),
            "websocket": format!("ws://{}/ws/connect", base),
            "rpc": format!("http://{}/rpc", state.config.rpc_addr()),
        },
    }))
}
