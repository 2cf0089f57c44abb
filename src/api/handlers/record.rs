//! Record CRUD handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::api::server::AppState;
use crate::error::PolyportError;
use crate::models::{DataResponse, RecordInput, RecordListParams};

/// List records with optional search and pagination
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListParams>,
) -> Result<impl IntoResponse, PolyportError> {
    let (items, total) = state.records.list(&params)?;

    Ok(Json(
        DataResponse::ok(format!("Found {} records", items.len()), items).with_total(total),
    ))
}

/// Get a single record
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PolyportError> {
    match state.records.get(id) {
        Some(record) => Ok(Json(DataResponse::ok("Record retrieved", record))),
        None => Err(PolyportError::RecordNotFound { id }),
    }
}

/// Create a new record
pub async fn create_record(
    State(state): State<AppState>,
    Json(input): Json<RecordInput>,
) -> Result<impl IntoResponse, PolyportError> {
    let record = state.records.create(input)?;

    info!(id = record.id, name = %record.name, "Created record");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::ok("Record created", record)),
    ))
}

/// Replace the mutable fields of a record
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<RecordInput>,
) -> Result<impl IntoResponse, PolyportError> {
    match state.records.update(id, input)? {
        Some(record) => {
            info!(id = record.id, name = %record.name, "Updated record");
            Ok(Json(DataResponse::ok("Record updated", record)))
        }
        None => Err(PolyportError::RecordNotFound { id }),
    }
}

/// Delete a record, returning what was removed
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PolyportError> {
    match state.records.delete(id) {
        Some(record) => {
            info!(id = record.id, "Deleted record");
            Ok(Json(DataResponse::ok("Record deleted", record)))
        }
        None => Err(PolyportError::RecordNotFound { id }),
    }
}
