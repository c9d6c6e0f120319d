//! Typed listener registry for synchronizer events.

use super::messages::{AvailabilityUpdate, ReservationEvent, TableStatusUpdate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Connection state of the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    /// Reconnect attempts exhausted; only an explicit reconnect leaves this state
    Failed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A connection state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub status: ConnectionStatus,
    /// Consecutive failed connection attempts
    pub attempt: u32,
    pub reason: Option<String>,
}

impl ConnectionEvent {
    /// Whether the synchronizer gave up reconnecting
    pub fn is_permanent_failure(&self) -> bool {
        self.status == ConnectionStatus::Failed
    }
}

/// Everything the synchronizer publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Availability(AvailabilityUpdate),
    TableStatus(TableStatusUpdate),
    Reservation(ReservationEvent),
    Connection(ConnectionEvent),
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    listeners: Mutex<BTreeMap<u64, Callback<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T> Registry<T> {
    fn add(&self, id: u64, callback: Callback<T>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
    }

    fn remove(&self, id: u64) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Call listeners in registration order. The lock is released first so a
    /// listener may unsubscribe itself.
    fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for callback in snapshot {
            callback(value);
        }
    }

    fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Availability,
    TableStatus,
    Reservation,
    Connection,
}

/// Listener registry shared by the synchronizer actor and its handles
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    availability: Registry<AvailabilityUpdate>,
    table_status: Registry<TableStatusUpdate>,
    reservation: Registry<ReservationEvent>,
    connection: Registry<ConnectionEvent>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_availability_update<F>(self: &Arc<Self>, callback: F) -> ListenerHandle
    where
        F: Fn(&AvailabilityUpdate) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.availability.add(id, Arc::new(callback));
        self.handle(id, ListenerKind::Availability)
    }

    pub fn on_table_status_update<F>(self: &Arc<Self>, callback: F) -> ListenerHandle
    where
        F: Fn(&TableStatusUpdate) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table_status.add(id, Arc::new(callback));
        self.handle(id, ListenerKind::TableStatus)
    }

    pub fn on_reservation_event<F>(self: &Arc<Self>, callback: F) -> ListenerHandle
    where
        F: Fn(&ReservationEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.reservation.add(id, Arc::new(callback));
        self.handle(id, ListenerKind::Reservation)
    }

    pub fn on_connection_change<F>(self: &Arc<Self>, callback: F) -> ListenerHandle
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connection.add(id, Arc::new(callback));
        self.handle(id, ListenerKind::Connection)
    }

    pub fn emit_availability(&self, update: &AvailabilityUpdate) {
        self.availability.emit(update);
    }

    pub fn emit_table_status(&self, update: &TableStatusUpdate) {
        self.table_status.emit(update);
    }

    pub fn emit_reservation(&self, event: &ReservationEvent) {
        self.reservation.emit(event);
    }

    pub fn emit_connection(&self, event: &ConnectionEvent) {
        self.connection.emit(event);
    }

    /// Total registered listeners across all event types
    pub fn listener_count(&self) -> usize {
        self.availability.len()
            + self.table_status.len()
            + self.reservation.len()
            + self.connection.len()
    }

    fn handle(self: &Arc<Self>, id: u64, kind: ListenerKind) -> ListenerHandle {
        ListenerHandle {
            id,
            kind,
            hub: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64, kind: ListenerKind) -> bool {
        match kind {
            ListenerKind::Availability => self.availability.remove(id),
            ListenerKind::TableStatus => self.table_status.remove(id),
            ListenerKind::Reservation => self.reservation.remove(id),
            ListenerKind::Connection => self.connection.remove(id),
        }
    }
}

/// Returned by every `on_*` registration. Dropping it keeps the listener;
/// call [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: u64,
    kind: ListenerKind,
    hub: Weak<EventHub>,
}

impl ListenerHandle {
    /// Remove the listener. Returns false if it was already removed or the
    /// synchronizer is gone.
    pub fn unsubscribe(&self) -> bool {
        self.hub
            .upgrade()
            .is_some_and(|hub| hub.remove(self.id, self.kind))
    }
}
