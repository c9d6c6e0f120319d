//! Availability board and the WebSocket push endpoint.
//!
//! The board is the server-side source of truth for slot and table status.
//! Updates arrive over REST, are applied last-write-wins, and fan out over a
//! broadcast channel to every connected WebSocket client (filtered by what
//! each client subscribed to) and to the reservation coordinator.
//!
//! # Protocol
//!
//! Frames are JSON envelopes `{"type": ..., "data": ...}`:
//!
//! ```text
//! client -> server   subscribe, unsubscribe, subscribeTable,
//!                    unsubscribeTable, requestSnapshot
//! server -> client   availabilityUpdate, tableStatusUpdate, reservationEvent,
//!                    subscriptionConfirmed, availabilitySnapshot, error
//! ```

use axum::{
    Json,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use table_reserve::{
    TableId, TableStatus, TimeSlot,
    sync::{
        AvailabilitySnapshot, AvailabilityUpdate, ClientMessage, ReservationEvent, ServerMessage,
        SharedCache, SubscriptionConfirmed, SyncEvent, TableStatusUpdate,
    },
};
use tokio::sync::broadcast::{self, error::RecvError};

use super::{ApiResult, AppState, error_response, store_error};

/// Server-side availability state plus its event fan-out
#[derive(Clone)]
pub struct AvailabilityBoard {
    cache: SharedCache,
    events: broadcast::Sender<SyncEvent>,
}

impl AvailabilityBoard {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            cache: SharedCache::new(),
            events,
        }
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    /// Receive every event the board publishes
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Apply and broadcast a slot update. Returns false if it was stale.
    pub async fn publish_availability(&self, update: AvailabilityUpdate) -> bool {
        let applied = self.cache.write().await.apply_availability(&update);
        if applied {
            let _ = self.events.send(SyncEvent::Availability(update));
        }
        applied
    }

    /// Apply and broadcast a table update. Returns false if it was stale.
    pub async fn publish_table_status(&self, update: TableStatusUpdate) -> bool {
        let applied = self.cache.write().await.apply_table_status(&update);
        if applied {
            let _ = self.events.send(SyncEvent::TableStatus(update));
        }
        applied
    }

    pub fn publish_reservation(&self, event: ReservationEvent) {
        let _ = self.events.send(SyncEvent::Reservation(event));
    }

    pub async fn snapshot(&self, date: NaiveDate, time_slot: Option<TimeSlot>) -> AvailabilitySnapshot {
        self.cache.snapshot(date, time_slot).await
    }
}

/// Body of `POST /api/v1/availability`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAvailabilityRequest {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub table_id: TableId,
    pub status: TableStatus,
    /// Defaults to the time the server received the request
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// False when a newer update was already on the board
    pub applied: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
}

/// Publish a slot status change.
///
/// # Errors
///
/// - `400 Bad Request`: Slot not on the seating grid
/// - `404 Not Found`: Unknown table
pub async fn publish_availability(
    State(state): State<AppState>,
    Json(request): Json<PublishAvailabilityRequest>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    if !state.waitlist.config().slot_grid.contains(request.time_slot) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Time slot {} is not on the seating grid", request.time_slot),
        ));
    }
    if state.tables.find(request.table_id).await.map_err(store_error)?.is_none() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Table {} not found", request.table_id),
        ));
    }

    let update = AvailabilityUpdate {
        date: request.date,
        time_slot: request.time_slot,
        table_id: request.table_id,
        status: request.status,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
    };
    let applied = state.board.publish_availability(update).await;

    tracing::info!(
        table_id = request.table_id,
        date = %request.date,
        time_slot = %request.time_slot,
        status = %request.status,
        applied,
        "Availability published"
    );

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { applied })))
}

/// Publish a reservation lifecycle event
pub async fn publish_reservation_event(
    State(state): State<AppState>,
    Json(event): Json<ReservationEvent>,
) -> StatusCode {
    tracing::info!(
        reservation_id = %event.reservation_id,
        event_type = ?event.event_type,
        "Reservation event published"
    );
    state.board.publish_reservation(event);
    StatusCode::ACCEPTED
}

/// Snapshot of every cached slot for a date
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<SnapshotQuery>,
) -> Json<AvailabilitySnapshot> {
    Json(state.board.snapshot(date, query.time_slot).await)
}

/// What one WebSocket client asked to hear about
#[derive(Debug, Default)]
struct SubscriptionFilter {
    dates: BTreeSet<NaiveDate>,
    tables: BTreeSet<TableId>,
}

/// Response to one client frame
#[derive(Debug, PartialEq)]
enum Reply {
    Send(ServerMessage),
    Snapshot {
        date: NaiveDate,
        time_slot: Option<TimeSlot>,
    },
    Nothing,
}

impl SubscriptionFilter {
    fn apply(&mut self, text: &str) -> Reply {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                return Reply::Send(ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                });
            }
        };

        match message {
            ClientMessage::Subscribe { date } => {
                self.dates.insert(date);
                Reply::Send(ServerMessage::SubscriptionConfirmed(SubscriptionConfirmed {
                    date: Some(date),
                    table_id: None,
                }))
            }
            ClientMessage::Unsubscribe { date } => {
                self.dates.remove(&date);
                Reply::Nothing
            }
            ClientMessage::SubscribeTable { table_id } => {
                self.tables.insert(table_id);
                Reply::Send(ServerMessage::SubscriptionConfirmed(SubscriptionConfirmed {
                    date: None,
                    table_id: Some(table_id),
                }))
            }
            ClientMessage::UnsubscribeTable { table_id } => {
                self.tables.remove(&table_id);
                Reply::Nothing
            }
            ClientMessage::RequestSnapshot { date, time_slot } => Reply::Snapshot { date, time_slot },
        }
    }

    /// The frame to forward for a board event, if the client wants it
    fn forward(&self, event: SyncEvent) -> Option<ServerMessage> {
        match event {
            SyncEvent::Availability(update) if self.dates.contains(&update.date) => {
                Some(ServerMessage::AvailabilityUpdate(update))
            }
            SyncEvent::TableStatus(update) if self.tables.contains(&update.table_id) => {
                Some(ServerMessage::TableStatusUpdate(update))
            }
            SyncEvent::Reservation(event)
                if event.date.is_some_and(|d| self.dates.contains(&d))
                    || event.table_id.is_some_and(|t| self.tables.contains(&t)) =>
            {
                Some(ServerMessage::ReservationEvent(event))
            }
            _ => None,
        }
    }
}

/// Upgrade to the availability push channel
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.board))
}

async fn handle_socket(socket: WebSocket, board: AvailabilityBoard) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = board.subscribe();
    let mut filter = SubscriptionFilter::default();

    tracing::info!("Availability client connected");

    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match filter.apply(text.as_str()) {
                    Reply::Send(message) => Some(message),
                    Reply::Snapshot { date, time_slot } => Some(ServerMessage::AvailabilitySnapshot(
                        board.snapshot(date, time_slot).await,
                    )),
                    Reply::Nothing => None,
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Availability socket error");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => filter.forward(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Availability client lagged");
                    None
                }
                Err(RecvError::Closed) => break,
            },
        };

        let Some(message) = outgoing else {
            continue;
        };
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode availability frame");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    tracing::info!(
        dates = filter.dates.len(),
        tables = filter.tables.len(),
        "Availability client disconnected"
    );
}
