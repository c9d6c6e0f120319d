//! Table inventory API handlers.
//!
//! - Listing the floor plan
//! - Creating or replacing a table
//! - Setting the live status of a table, which is pushed to subscribers
//!
//! # Examples
//!
//! List all tables:
//! ```bash
//! curl http://localhost:8080/api/v1/tables
//! ```
//!
//! Take a table out of service:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/tables/4/status \
//!   -H "Content-Type: application/json" \
//!   -d '{"status": "maintenance"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use table_reserve::{Table, TableId, TableStatus, sync::TableStatusUpdate};

use super::{ApiResult, AppState, error_response, store_error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub status: TableStatus,
    /// Reservation currently seated at the table, if any
    #[serde(default)]
    pub current_reservation: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusResponse {
    pub table_id: TableId,
    pub status: TableStatus,
    /// False when the board already held a newer status
    pub applied: bool,
}

/// List every table on the floor plan.
///
/// # Response
///
/// Returns `200 OK` with an array of tables ordered by ID:
/// ```json
/// [
///   {
///     "id": 1,
///     "number": 1,
///     "capacity": 4,
///     "shape": "round",
///     "location": "indoor",
///     "features": ["window-view"],
///     "status": "available",
///     "position": null
///   }
/// ]
/// ```
///
/// # Errors
///
/// - `500 Internal Server Error`: Store failure
pub async fn list_tables(State(state): State<AppState>) -> ApiResult<Json<Vec<Table>>> {
    let mut tables = state.tables.list().await.map_err(store_error)?;
    tables.sort_by_key(|t| t.id);
    Ok(Json(tables))
}

/// Create a table, or replace the one with the same ID.
///
/// # Errors
///
/// - `400 Bad Request`: Capacity of zero
/// - `500 Internal Server Error`: Store failure
pub async fn upsert_table(
    State(state): State<AppState>,
    Json(table): Json<Table>,
) -> ApiResult<(StatusCode, Json<Table>)> {
    if table.capacity == 0 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Table capacity must be at least 1",
        ));
    }

    state.tables.upsert(&table).await.map_err(store_error)?;
    tracing::info!(
        table_id = table.id,
        capacity = table.capacity,
        location = %table.location,
        "Table saved"
    );

    Ok((StatusCode::OK, Json(table)))
}

/// Set the live status of a table.
///
/// The status is stored and published to every client subscribed to the
/// table. Marking a table available frees it for waitlisted parties.
///
/// # Path Parameters
///
/// - `table_id`: Table ID (integer)
///
/// # Errors
///
/// - `404 Not Found`: Table doesn't exist
/// - `500 Internal Server Error`: Store failure
pub async fn set_table_status(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<Json<SetStatusResponse>> {
    let found = state
        .tables
        .update_status(table_id, request.status)
        .await
        .map_err(store_error)?;
    if !found {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Table {} not found", table_id),
        ));
    }

    let applied = state
        .board
        .publish_table_status(TableStatusUpdate {
            table_id,
            status: request.status,
            current_reservation: request.current_reservation,
            timestamp: Utc::now(),
        })
        .await;

    tracing::info!(table_id, status = %request.status, applied, "Table status set");

    Ok(Json(SetStatusResponse {
        table_id,
        status: request.status,
        applied,
    }))
}
