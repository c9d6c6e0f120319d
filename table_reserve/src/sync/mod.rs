//! Live availability synchronization.
//!
//! An [`AvailabilitySynchronizer`] actor keeps one push connection to the
//! availability server, maintains a local cache of slot and table status, and
//! fans events out to registered listeners and to a broadcast channel.
//!
//! Connection lifecycle:
//!
//! ```text
//! connecting ──▶ connected ──▶ disconnected ──(backoff)──▶ connecting
//!      │                                                      │
//!      └──────────── attempts exhausted ──▶ failed ◀──────────┘
//! ```
//!
//! After every successful connect, each active date and table subscription is
//! sent exactly once and a fresh snapshot is requested for every date.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use table_reserve::sync::{AvailabilitySynchronizer, SyncConfig, WebSocketTransport};
//!
//! # async fn run() {
//! let config = SyncConfig::from_env();
//! let transport = Arc::new(WebSocketTransport::new(config.url.clone()));
//! let sync = AvailabilitySynchronizer::spawn(config, transport);
//!
//! let listener = sync.on_availability_update(|update| {
//!     println!("table {} is {}", update.table_id, update.status);
//! });
//! sync.subscribe_to_date(chrono::Utc::now().date_naive()).await.ok();
//! # listener.unsubscribe();
//! # }
//! ```

pub mod cache;
pub mod events;
pub mod messages;
pub mod synchronizer;
pub mod transport;
pub mod ws_transport;

pub use cache::{AvailabilityCache, SharedCache, SlotSummary};
pub use events::{ConnectionEvent, ConnectionStatus, EventHub, ListenerHandle, SyncEvent};
pub use messages::{
    AvailabilitySnapshot, AvailabilityUpdate, ClientMessage, ReservationEvent,
    ReservationEventType, ServerMessage, SubscriptionConfirmed, TableStatusUpdate,
};
pub use synchronizer::{AvailabilitySynchronizer, SyncConfig, SyncError, SynchronizerHandle};
pub use transport::{Connection, Frame, Transport, TransportError};
pub use ws_transport::WebSocketTransport;
