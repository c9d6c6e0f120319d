//! Table request handlers.
//!
//! A request either holds the best-scoring table for its slot or, when no
//! table is satisfactory, joins the waitlist. Holds are published to the
//! availability board so other clients see the table as reserved.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use table_reserve::{
    Allocation, ReservationRequest, TableId, TableStatus, TimeSlot,
    scoring::TableAssignmentResult,
    sync::AvailabilityUpdate,
    waitlist::{ContactInfo, WaitlistEntry},
};

use super::{ApiResult, AppState, coordinator_error, error_response};

/// Body of `POST /api/v1/reservations`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRequest {
    #[serde(flatten)]
    pub request: ReservationRequest,
    /// Used if the request ends up on the waitlist
    pub contact: ContactInfo,
    /// Other slots the guest would take while waiting
    #[serde(default)]
    pub acceptable_slots: Vec<TimeSlot>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AllocationResponse {
    Assigned { assignment: TableAssignmentResult },
    Waitlisted { entry: WaitlistEntry },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub table_id: TableId,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Request a table.
///
/// # Request Body
///
/// ```json
/// {
///   "guestCount": 4,
///   "date": "2030-06-01",
///   "timeSlot": "19:00",
///   "seatingPreference": "outdoor",
///   "occasion": "birthday",
///   "contact": {"name": "Ada", "email": "ada@example.com", "phone": null},
///   "acceptableSlots": ["19:30", "20:00"]
/// }
/// ```
///
/// # Response
///
/// - `200 OK` with `{"outcome": "assigned", "assignment": {...}}`
/// - `202 Accepted` with `{"outcome": "waitlisted", "entry": {...}}`
///
/// # Errors
///
/// - `400 Bad Request`: Empty party, off-grid slot, past date or missing contact
/// - `500 Internal Server Error`: Store failure
pub async fn request_table(
    State(state): State<AppState>,
    Json(body): Json<TableRequest>,
) -> ApiResult<(StatusCode, Json<AllocationResponse>)> {
    let allocation = state
        .coordinator
        .request_table(&body.request, body.contact, &body.acceptable_slots)
        .await
        .map_err(coordinator_error)?;

    match allocation {
        Allocation::Assigned(assignment) => {
            state
                .board
                .publish_availability(AvailabilityUpdate {
                    date: body.request.date,
                    time_slot: body.request.time_slot,
                    table_id: assignment.table.id,
                    status: TableStatus::Reserved,
                    timestamp: Utc::now(),
                })
                .await;
            Ok((StatusCode::OK, Json(AllocationResponse::Assigned { assignment })))
        }
        Allocation::Waitlisted(entry) => {
            tracing::info!(
                entry_id = %entry.id,
                guests = entry.guest_count,
                position = ?entry.position,
                "Request waitlisted"
            );
            Ok((StatusCode::ACCEPTED, Json(AllocationResponse::Waitlisted { entry })))
        }
    }
}

/// Release a tentative hold. The table becomes available for the slot and
/// is offered to the waitlist.
///
/// # Errors
///
/// - `404 Not Found`: No hold on that table for that slot
pub async fn release_hold(
    State(state): State<AppState>,
    Json(body): Json<ReleaseRequest>,
) -> ApiResult<Json<ReleaseResponse>> {
    if !state
        .coordinator
        .release_hold(body.date, body.time_slot, body.table_id)
    {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!(
                "No hold on table {} for {} {}",
                body.table_id, body.date, body.time_slot
            ),
        ));
    }

    state
        .board
        .publish_availability(AvailabilityUpdate {
            date: body.date,
            time_slot: body.time_slot,
            table_id: body.table_id,
            status: TableStatus::Available,
            timestamp: Utc::now(),
        })
        .await;

    tracing::info!(table_id = body.table_id, date = %body.date, time_slot = %body.time_slot, "Hold released");

    Ok(Json(ReleaseResponse { released: true }))
}
