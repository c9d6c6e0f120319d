//! WebSocket integration tests for the availability push channel.
//!
//! Binds the real router on an ephemeral port and talks to it with a
//! tungstenite client.

use chrono::{Duration, NaiveDate, Utc};
use futures_util::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use table_reserve::{
    LocationZone, Table, TableStatus, TimeSlot,
    db::{InMemoryTableRepository, InMemoryWaitlistRepository},
    notify::LogDispatcher,
    sync::{
        AvailabilityUpdate, ClientMessage, ReservationEvent, ReservationEventType, ServerMessage,
        TableStatusUpdate,
    },
};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tr_server::{
    api::{AppState, create_router},
    config::ServerConfig,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(14)
}

fn seven_pm() -> TimeSlot {
    TimeSlot::from_hm(19, 0).unwrap()
}

fn update(date: NaiveDate, table_id: i64, status: TableStatus) -> AvailabilityUpdate {
    AvailabilityUpdate {
        date,
        time_slot: seven_pm(),
        table_id,
        status,
        timestamp: Utc::now(),
    }
}

/// Helper to start a server on an ephemeral port
async fn start_server() -> (SocketAddr, AppState) {
    let state = AppState::new(
        Arc::new(InMemoryWaitlistRepository::new()),
        Arc::new(InMemoryTableRepository::new().with_tables([
            Table::new(1, 1, 2, LocationZone::Indoor),
            Table::new(2, 2, 6, LocationZone::Private),
        ])),
        Arc::new(LogDispatcher),
        &ServerConfig::default(),
    );
    let app = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/availability", addr))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Client, message: ClientMessage) {
    ws.send(Message::text(message.to_json().unwrap()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_subscribe_confirms_and_filters_by_date() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send(&mut ws, ClientMessage::Subscribe { date: date() }).await;
    match recv(&mut ws).await {
        ServerMessage::SubscriptionConfirmed(confirmed) => {
            assert_eq!(confirmed.date, Some(date()));
            assert_eq!(confirmed.table_id, None);
        }
        other => panic!("expected confirmation, got {:?}", other),
    }

    let elsewhere = date() + Duration::days(1);
    state
        .board
        .publish_availability(update(elsewhere, 1, TableStatus::Reserved))
        .await;
    let wanted = update(date(), 2, TableStatus::Reserved);
    state.board.publish_availability(wanted.clone()).await;

    assert_eq!(recv(&mut ws).await, ServerMessage::AvailabilityUpdate(wanted));
}

#[tokio::test]
async fn test_snapshot_request_returns_board_state() {
    let (addr, state) = start_server().await;
    state
        .board
        .publish_availability(update(date(), 1, TableStatus::Occupied))
        .await;

    let mut ws = connect(addr).await;
    send(
        &mut ws,
        ClientMessage::RequestSnapshot {
            date: date(),
            time_slot: Some(seven_pm()),
        },
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::AvailabilitySnapshot(snapshot) => {
            assert_eq!(snapshot.date, date());
            assert_eq!(snapshot.slots.len(), 1);
            assert_eq!(snapshot.slots[0].table_id, 1);
            assert_eq!(snapshot.slots[0].status, TableStatus::Occupied);
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_table_subscription_receives_status_and_reservations() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send(&mut ws, ClientMessage::SubscribeTable { table_id: 2 }).await;
    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::SubscriptionConfirmed(_)
    ));

    let status = TableStatusUpdate {
        table_id: 2,
        status: TableStatus::Maintenance,
        current_reservation: None,
        timestamp: Utc::now(),
    };
    state.board.publish_table_status(status.clone()).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::TableStatusUpdate(status));

    let event = ReservationEvent {
        event_type: ReservationEventType::TableFreed,
        table_id: Some(2),
        guest_count: Some(5),
        reservation_id: "R-9".to_string(),
        date: None,
        time_slot: None,
        timestamp: Utc::now(),
    };
    state.board.publish_reservation(event.clone());
    assert_eq!(recv(&mut ws).await, ServerMessage::ReservationEvent(event));
}

#[tokio::test]
async fn test_unsubscribe_stops_updates() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send(&mut ws, ClientMessage::Subscribe { date: date() }).await;
    recv(&mut ws).await;
    send(&mut ws, ClientMessage::Unsubscribe { date: date() }).await;

    // Once the table subscription is confirmed, the unsubscribe before it has been handled
    send(&mut ws, ClientMessage::SubscribeTable { table_id: 1 }).await;
    recv(&mut ws).await;

    state
        .board
        .publish_availability(update(date(), 1, TableStatus::Reserved))
        .await;
    let status = TableStatusUpdate {
        table_id: 1,
        status: TableStatus::Occupied,
        current_reservation: None,
        timestamp: Utc::now(),
    };
    state.board.publish_table_status(status.clone()).await;

    assert_eq!(recv(&mut ws).await, ServerMessage::TableStatusUpdate(status));
}

#[tokio::test]
async fn test_malformed_frame_gets_error() {
    let (addr, _state) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::text("{\"type\":\"subscribe\",\"data\":{}}"))
        .await
        .unwrap();

    match recv(&mut ws).await {
        ServerMessage::Error { message } => assert!(message.starts_with("Invalid message")),
        other => panic!("expected error, got {:?}", other),
    }
}
