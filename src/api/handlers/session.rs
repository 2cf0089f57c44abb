//! Session registry introspection

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Snapshot of the live WebSocket sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let session_ids = state.sessions.list_ids();

    Json(json!({
        "count": session_ids.len(),
        "session_ids": session_ids,
    }))
}
