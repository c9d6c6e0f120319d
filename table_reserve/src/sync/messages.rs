//! Availability protocol messages.
//!
//! Every frame is a JSON envelope `{"type": "...", "data": {...}}`.

use crate::table::{TableId, TableStatus, TimeSlot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Status of one table for one date and slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub table_id: TableId,
    pub status: TableStatus,
    pub timestamp: DateTime<Utc>,
}

/// Live status of a table, independent of slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatusUpdate {
    pub table_id: TableId,
    pub status: TableStatus,
    #[serde(default)]
    pub current_reservation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reservation lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationEventType {
    Created,
    Cancelled,
    Modified,
    TableAssigned,
    TableFreed,
}

impl ReservationEventType {
    /// Whether the event may leave a table free for someone else
    pub fn frees_table(&self) -> bool {
        matches!(
            self,
            ReservationEventType::Cancelled | ReservationEventType::TableFreed
        )
    }
}

/// Something happened to a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationEvent {
    pub event_type: ReservationEventType,
    #[serde(default)]
    pub table_id: Option<TableId>,
    #[serde(default)]
    pub guest_count: Option<u32>,
    pub reservation_id: String,
    /// Date and slot of the reservation, when the sender knows them
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of a subscription request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfirmed {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub table_id: Option<TableId>,
}

/// Full state for a date, optionally narrowed to one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySnapshot {
    pub date: NaiveDate,
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
    #[serde(default)]
    pub slots: Vec<AvailabilityUpdate>,
    #[serde(default)]
    pub tables: Vec<TableStatusUpdate>,
    pub timestamp: DateTime<Utc>,
}

/// Client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        date: NaiveDate,
    },
    Unsubscribe {
        date: NaiveDate,
    },
    #[serde(rename_all = "camelCase")]
    SubscribeTable {
        table_id: TableId,
    },
    #[serde(rename_all = "camelCase")]
    UnsubscribeTable {
        table_id: TableId,
    },
    #[serde(rename_all = "camelCase")]
    RequestSnapshot {
        date: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_slot: Option<TimeSlot>,
    },
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    AvailabilityUpdate(AvailabilityUpdate),
    TableStatusUpdate(TableStatusUpdate),
    ReservationEvent(ReservationEvent),
    SubscriptionConfirmed(SubscriptionConfirmed),
    AvailabilitySnapshot(AvailabilitySnapshot),
    Error { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
