//! Waitlist API handlers.
//!
//! Every state change goes through [`WaitlistManager`]'s compare-and-set
//! transitions, so two staff members acting on the same entry get exactly
//! one success and one `409 Conflict`. Confirm, cancel and expire go through
//! the [`ReservationCoordinator`] so the table held for an offer follows the
//! entry.
//!
//! [`WaitlistManager`]: table_reserve::waitlist::WaitlistManager
//! [`ReservationCoordinator`]: table_reserve::ReservationCoordinator
//!
//! # Examples
//!
//! Join the waitlist:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/waitlist \
//!   -H "Content-Type: application/json" \
//!   -d '{"contact": {"name": "Ada", "phone": "555-010-2000"},
//!        "guestCount": 2, "preferredDate": "2030-06-01",
//!        "timeSlots": ["19:00", "19:30"]}'
//! ```
//!
//! Look up by phone, formatting ignored:
//! ```bash
//! curl 'http://localhost:8080/api/v1/waitlist?phone=(555)%20010-2000'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use table_reserve::{
    TableStatus,
    sync::AvailabilityUpdate,
    waitlist::{QueuePosition, SearchCriteria, WaitlistEntry, WaitlistId, WaitlistRequest},
};

use super::{ApiResult, AppState, coordinator_error, waitlist_error};
use crate::logging::log_waitlist_transition;

/// Add a party to the waitlist.
///
/// # Response
///
/// Returns `201 Created` with the entry, including its position and
/// estimated wait.
///
/// # Errors
///
/// - `400 Bad Request`: Missing contact, empty party, past date or off-grid slot
pub async fn enqueue(
    State(state): State<AppState>,
    Json(request): Json<WaitlistRequest>,
) -> ApiResult<(StatusCode, Json<WaitlistEntry>)> {
    let entry = state.waitlist.enqueue(request).await.map_err(waitlist_error)?;
    log_waitlist_transition(entry.id, "enqueue", entry.status.as_str());
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Find active entries by ID, email or phone. An entry matching any of the
/// given criteria is returned.
///
/// # Errors
///
/// - `400 Bad Request`: No criteria given
pub async fn search(
    State(state): State<AppState>,
    Query(criteria): Query<SearchCriteria>,
) -> ApiResult<Json<Vec<WaitlistEntry>>> {
    let entries = state.waitlist.search(&criteria).await.map_err(waitlist_error)?;
    Ok(Json(entries))
}

/// Get one entry in any state
///
/// # Errors
///
/// - `404 Not Found`: Unknown entry
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<WaitlistId>,
) -> ApiResult<Json<WaitlistEntry>> {
    let entry = state.waitlist.get(id).await.map_err(waitlist_error)?;
    Ok(Json(entry))
}

/// Tell a pending party their table is ready.
///
/// # Errors
///
/// - `404 Not Found`: Unknown entry
/// - `409 Conflict`: Entry is not pending
pub async fn notify(
    State(state): State<AppState>,
    Path(id): Path<WaitlistId>,
) -> ApiResult<Json<WaitlistEntry>> {
    let entry = state.waitlist.notify(id).await.map_err(waitlist_error)?;
    log_waitlist_transition(entry.id, "notify", entry.status.as_str());
    Ok(Json(entry))
}

/// Accept an offered table. The table held for the offer stays held and
/// the slot is published as reserved.
///
/// # Errors
///
/// - `404 Not Found`: Unknown entry
/// - `409 Conflict`: Entry is not notified
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<WaitlistId>,
) -> ApiResult<Json<WaitlistEntry>> {
    let confirmed = state
        .coordinator
        .confirm_offer(id)
        .await
        .map_err(coordinator_error)?;

    if let Some(held) = confirmed.table {
        state
            .board
            .publish_availability(AvailabilityUpdate {
                date: held.date,
                time_slot: held.time_slot,
                table_id: held.table_id,
                status: TableStatus::Reserved,
                timestamp: Utc::now(),
            })
            .await;
    }

    let entry = confirmed.entry;
    log_waitlist_transition(entry.id, "confirm", entry.status.as_str());
    Ok(Json(entry))
}

/// Withdraw from the waitlist. A table offered to the entry goes to the
/// next party.
///
/// # Errors
///
/// - `404 Not Found`: Unknown entry
/// - `409 Conflict`: Entry already closed
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<WaitlistId>,
) -> ApiResult<Json<WaitlistEntry>> {
    let entry = state
        .coordinator
        .cancel_entry(id)
        .await
        .map_err(coordinator_error)?;
    log_waitlist_transition(entry.id, "cancel", entry.status.as_str());
    Ok(Json(entry))
}

/// Close an entry without seating it
pub async fn expire(
    State(state): State<AppState>,
    Path(id): Path<WaitlistId>,
) -> ApiResult<Json<WaitlistEntry>> {
    let entry = state
        .coordinator
        .expire_entry(id)
        .await
        .map_err(coordinator_error)?;
    log_waitlist_transition(entry.id, "expire", entry.status.as_str());
    Ok(Json(entry))
}

/// Recompute positions and wait estimates for every pending entry
pub async fn recompute(State(state): State<AppState>) -> ApiResult<Json<Vec<QueuePosition>>> {
    let positions = state
        .waitlist
        .recompute_positions()
        .await
        .map_err(waitlist_error)?;
    tracing::debug!(pending = positions.len(), "Queue positions recomputed");
    Ok(Json(positions))
}
