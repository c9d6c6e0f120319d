//! Synchronizer actor and its handle.

use super::{
    cache::{SharedCache, SlotSummary},
    events::{ConnectionEvent, ConnectionStatus, EventHub, ListenerHandle, SyncEvent},
    messages::{
        AvailabilityUpdate, ClientMessage, ReservationEvent, ServerMessage, TableStatusUpdate,
    },
    transport::{Connection, Frame, Transport},
};
use crate::table::{TableId, TableStatus, TimeSlot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, sleep};

/// Capacity of the async event broadcast
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the command inbox
const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Availability endpoint, e.g. `ws://localhost:8080/ws/availability`
    pub url: String,

    /// Delay before the first retry (default: 500 ms)
    pub base_delay: Duration,

    /// Upper bound on the retry delay (default: 30 s)
    pub max_delay: Duration,

    /// Consecutive failed attempts before giving up (default: 10)
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws/availability".to_string(),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// - `SYNC_URL`
    /// - `SYNC_BASE_DELAY_MS` (default: 500)
    /// - `SYNC_MAX_DELAY_MS` (default: 30000)
    /// - `SYNC_MAX_ATTEMPTS` (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            url: std::env::var("SYNC_URL").unwrap_or(defaults.url),
            base_delay: millis("SYNC_BASE_DELAY_MS", defaults.base_delay),
            max_delay: millis("SYNC_MAX_DELAY_MS", defaults.max_delay),
            max_attempts: std::env::var("SYNC_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Sync URL must not be empty".to_string());
        }

        if self.base_delay.is_zero() {
            return Err("Base reconnect delay must be greater than 0".to_string());
        }

        if self.max_delay < self.base_delay {
            return Err("Max reconnect delay must not be below the base delay".to_string());
        }

        if self.max_attempts == 0 {
            return Err("Max reconnect attempts must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Delay after the given number of consecutive failures (1-based):
    /// `base * 2^(failures - 1)`, capped at `max_delay`
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Synchronizer errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// The actor has shut down
    #[error("Synchronizer is not running")]
    Stopped,
}

#[derive(Debug)]
enum Command {
    SubscribeDate(NaiveDate),
    UnsubscribeDate(NaiveDate),
    SubscribeTable(TableId),
    UnsubscribeTable(TableId),
    RequestSnapshot {
        date: NaiveDate,
        time_slot: Option<TimeSlot>,
    },
    Reconnect,
    Shutdown,
}

/// Why the actor stopped waiting
enum Wake {
    Timer,
    Reconnect,
    Shutdown,
}

/// Why a live connection ended
enum Exit {
    /// Peer went away; `received` is true if any frame arrived first
    Closed {
        reason: Option<String>,
        received: bool,
    },
    Shutdown,
}

/// Handle to a running synchronizer
#[derive(Clone)]
pub struct SynchronizerHandle {
    commands: mpsc::Sender<Command>,
    cache: SharedCache,
    hub: Arc<EventHub>,
    events: broadcast::Sender<SyncEvent>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SynchronizerHandle {
    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::Stopped)
    }

    /// Receive slot updates for a date, now and after every reconnect
    pub async fn subscribe_to_date(&self, date: NaiveDate) -> Result<(), SyncError> {
        self.send(Command::SubscribeDate(date)).await
    }

    pub async fn unsubscribe_from_date(&self, date: NaiveDate) -> Result<(), SyncError> {
        self.send(Command::UnsubscribeDate(date)).await
    }

    pub async fn subscribe_table(&self, table_id: TableId) -> Result<(), SyncError> {
        self.send(Command::SubscribeTable(table_id)).await
    }

    pub async fn unsubscribe_table(&self, table_id: TableId) -> Result<(), SyncError> {
        self.send(Command::UnsubscribeTable(table_id)).await
    }

    /// Ask the server for the full state of a date. Dropped while disconnected.
    pub async fn request_snapshot(
        &self,
        date: NaiveDate,
        time_slot: Option<TimeSlot>,
    ) -> Result<(), SyncError> {
        self.send(Command::RequestSnapshot { date, time_slot }).await
    }

    /// Start connecting again after a permanent failure
    pub async fn reconnect(&self) -> Result<(), SyncError> {
        self.send(Command::Reconnect).await
    }

    /// Stop the actor and close the connection
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown).await
    }

    pub fn on_availability_update<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&AvailabilityUpdate) + Send + Sync + 'static,
    {
        self.hub.on_availability_update(callback)
    }

    pub fn on_table_status_update<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&TableStatusUpdate) + Send + Sync + 'static,
    {
        self.hub.on_table_status_update(callback)
    }

    pub fn on_reservation_event<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ReservationEvent) + Send + Sync + 'static,
    {
        self.hub.on_reservation_event(callback)
    }

    pub fn on_connection_change<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.hub.on_connection_change(callback)
    }

    /// Async stream of every published event
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status() == ConnectionStatus::Connected
    }

    /// Wait until the connection reaches `status`. Returns false if the
    /// actor stopped first.
    pub async fn wait_for_status(&self, status: ConnectionStatus) -> bool {
        let mut rx = self.status.clone();
        rx.wait_for(|s| *s == status).await.is_ok()
    }

    /// The cache this synchronizer writes
    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    pub async fn slot_status(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
        table: TableId,
    ) -> Option<TableStatus> {
        self.cache.slot_status(date, slot, table).await
    }

    pub async fn table_status(&self, table: TableId) -> Option<TableStatusUpdate> {
        self.cache.table_status(table).await
    }

    pub async fn slot_summary(&self, date: NaiveDate, slot: TimeSlot) -> SlotSummary {
        self.cache.slot_summary(date, slot).await
    }
}

/// Actor owning the connection and the cache writer.
///
/// Inbound frames are handled one at a time and listeners run inside the
/// actor task, so they observe events in arrival order.
pub struct AvailabilitySynchronizer {
    config: SyncConfig,
    transport: Arc<dyn Transport>,
    inbox: mpsc::Receiver<Command>,
    cache: SharedCache,
    hub: Arc<EventHub>,
    events: broadcast::Sender<SyncEvent>,
    status: watch::Sender<ConnectionStatus>,
    dates: BTreeSet<NaiveDate>,
    tables: BTreeSet<TableId>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl AvailabilitySynchronizer {
    /// Create the actor and a handle to it
    ///
    /// # Returns
    ///
    /// * `(AvailabilitySynchronizer, SynchronizerHandle)` - Run the actor with
    ///   [`run`](Self::run); use the handle everywhere else
    pub fn new(config: SyncConfig, transport: Arc<dyn Transport>) -> (Self, SynchronizerHandle) {
        let (commands, inbox) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let cache = SharedCache::new();
        let hub = EventHub::new();

        let handle = SynchronizerHandle {
            commands,
            cache: cache.clone(),
            hub: hub.clone(),
            events: events.clone(),
            status: status_rx,
        };

        let actor = Self {
            config,
            transport,
            inbox,
            cache,
            hub,
            events,
            status,
            dates: BTreeSet::new(),
            tables: BTreeSet::new(),
            outbound: None,
        };

        (actor, handle)
    }

    /// Create the actor and run it on the tokio runtime
    pub fn spawn(config: SyncConfig, transport: Arc<dyn Transport>) -> SynchronizerHandle {
        let (actor, handle) = Self::new(config, transport);
        tokio::spawn(actor.run());
        handle
    }

    /// Run the connection loop until shutdown or until every handle is dropped
    ///
    /// A connection only resets the failure count once it has proven
    /// healthy: it delivered a frame, or stayed up for at least `max_delay`.
    /// A server that accepts and immediately closes backs off like a refused
    /// connect and eventually exhausts the attempts.
    pub async fn run(mut self) {
        log::info!("Availability synchronizer starting for {}", self.config.url);

        let mut failures: u32 = 0;

        loop {
            self.set_status(ConnectionStatus::Connecting, failures, None);

            let reason = match self.transport.connect().await {
                Ok(connection) => {
                    let connected_at = Instant::now();
                    match self.serve(connection).await {
                        Exit::Shutdown => break,
                        Exit::Closed { reason, received } => {
                            let healthy =
                                received || connected_at.elapsed() >= self.config.max_delay;
                            log::info!(
                                "Availability connection closed: {:?} (healthy: {})",
                                reason,
                                healthy
                            );
                            if healthy {
                                failures = 0;
                                self.set_status(ConnectionStatus::Disconnected, 0, reason);
                                None
                            } else {
                                Some(reason.unwrap_or_else(|| "closed before any frame".to_string()))
                            }
                        }
                    }
                }
                Err(e) => Some(e.to_string()),
            };

            if let Some(reason) = reason {
                failures += 1;
                log::warn!(
                    "Availability connection attempt {}/{} failed: {}",
                    failures,
                    self.config.max_attempts,
                    reason
                );
                self.set_status(ConnectionStatus::Disconnected, failures, Some(reason));

                if failures >= self.config.max_attempts {
                    log::error!(
                        "Giving up on {} after {} attempts",
                        self.config.url,
                        failures
                    );
                    self.set_status(
                        ConnectionStatus::Failed,
                        failures,
                        Some("reconnect attempts exhausted".to_string()),
                    );
                    match self.idle(None).await {
                        Wake::Shutdown => break,
                        Wake::Reconnect | Wake::Timer => {
                            failures = 0;
                            continue;
                        }
                    }
                }
            }

            let delay = self.config.backoff_delay(failures.max(1));
            match self.idle(Some(delay)).await {
                Wake::Shutdown => break,
                Wake::Reconnect => failures = 0,
                Wake::Timer => {}
            }
        }

        self.outbound = None;
        self.set_status(ConnectionStatus::Disconnected, 0, Some("shutdown".to_string()));
        log::info!("Availability synchronizer stopped");
    }

    /// Process commands while disconnected, until the timer fires (if any),
    /// a reconnect is requested, or the actor is told to stop.
    async fn idle(&mut self, delay: Option<Duration>) -> Wake {
        let timer = async {
            match delay {
                Some(d) => sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Wake::Timer,
                command = self.inbox.recv() => match command {
                    None | Some(Command::Shutdown) => return Wake::Shutdown,
                    Some(Command::Reconnect) => return Wake::Reconnect,
                    Some(other) => self.apply(other).await,
                },
            }
        }
    }

    async fn serve(&mut self, mut connection: Connection) -> Exit {
        self.outbound = Some(connection.outbound.clone());
        self.set_status(ConnectionStatus::Connected, 0, None);
        self.resubscribe();

        let mut received = false;
        let exit = loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    None | Some(Command::Shutdown) => break Exit::Shutdown,
                    Some(Command::Reconnect) => {}
                    Some(other) => self.apply(other).await,
                },
                frame = connection.inbound.recv() => match frame {
                    Some(Frame::Message(text)) => {
                        received = true;
                        self.handle_text(&text).await;
                    }
                    Some(Frame::Closed(reason)) => break Exit::Closed { reason, received },
                    None => break Exit::Closed { reason: None, received },
                },
            }
        };

        self.outbound = None;
        exit
    }

    /// Re-issue every active subscription once and refresh each date
    fn resubscribe(&self) {
        let dates: Vec<NaiveDate> = self.dates.iter().copied().collect();
        for date in dates {
            self.transmit(&ClientMessage::Subscribe { date });
            self.transmit(&ClientMessage::RequestSnapshot {
                date,
                time_slot: None,
            });
        }
        for table_id in &self.tables {
            self.transmit(&ClientMessage::SubscribeTable {
                table_id: *table_id,
            });
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::SubscribeDate(date) => {
                if self.dates.insert(date) {
                    self.transmit(&ClientMessage::Subscribe { date });
                }
            }
            Command::UnsubscribeDate(date) => {
                if self.dates.remove(&date) {
                    self.cache.write().await.forget_date(date);
                    self.transmit(&ClientMessage::Unsubscribe { date });
                }
            }
            Command::SubscribeTable(table_id) => {
                if self.tables.insert(table_id) {
                    self.transmit(&ClientMessage::SubscribeTable { table_id });
                }
            }
            Command::UnsubscribeTable(table_id) => {
                if self.tables.remove(&table_id) {
                    self.transmit(&ClientMessage::UnsubscribeTable { table_id });
                }
            }
            Command::RequestSnapshot { date, time_slot } => {
                self.transmit(&ClientMessage::RequestSnapshot { date, time_slot });
            }
            Command::Reconnect | Command::Shutdown => {}
        }
    }

    /// Send if connected; otherwise drop
    fn transmit(&self, message: &ClientMessage) {
        let Some(outbound) = &self.outbound else {
            log::debug!("Not connected; dropping {:?}", message);
            return;
        };

        match message.to_json() {
            Ok(json) => {
                if outbound.send(json).is_err() {
                    log::debug!("Connection closed; dropping {:?}", message);
                }
            }
            Err(e) => log::error!("Failed to encode {:?}: {}", message, e),
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring unrecognised availability frame: {}", e);
                return;
            }
        };

        match message {
            ServerMessage::AvailabilityUpdate(update) => self.on_availability(update).await,
            ServerMessage::TableStatusUpdate(update) => self.on_table_status(update).await,
            ServerMessage::ReservationEvent(event) => {
                self.hub.emit_reservation(&event);
                let _ = self.events.send(SyncEvent::Reservation(event));
            }
            ServerMessage::SubscriptionConfirmed(confirmed) => {
                log::debug!("Subscription confirmed: {:?}", confirmed);
            }
            ServerMessage::AvailabilitySnapshot(snapshot) => {
                log::debug!(
                    "Snapshot for {}: {} slots, {} tables",
                    snapshot.date,
                    snapshot.slots.len(),
                    snapshot.tables.len()
                );
                for update in snapshot.slots {
                    self.on_availability(update).await;
                }
                for update in snapshot.tables {
                    self.on_table_status(update).await;
                }
            }
            ServerMessage::Error { message } => {
                log::warn!("Availability server error: {}", message);
            }
        }
    }

    async fn on_availability(&mut self, update: AvailabilityUpdate) {
        let applied = self.cache.write().await.apply_availability(&update);
        if !applied {
            log::debug!(
                "Discarding stale update for table {} at {} {}",
                update.table_id,
                update.date,
                update.time_slot
            );
            return;
        }

        self.hub.emit_availability(&update);
        let _ = self.events.send(SyncEvent::Availability(update));
    }

    async fn on_table_status(&mut self, update: TableStatusUpdate) {
        let applied = self.cache.write().await.apply_table_status(&update);
        if !applied {
            log::debug!("Discarding stale status for table {}", update.table_id);
            return;
        }

        self.hub.emit_table_status(&update);
        let _ = self.events.send(SyncEvent::TableStatus(update));
    }

    fn set_status(&self, status: ConnectionStatus, attempt: u32, reason: Option<String>) {
        self.status.send_replace(status);

        let event = ConnectionEvent {
            status,
            attempt,
            reason,
        };
        self.hub.emit_connection(&event);
        let _ = self.events.send(SyncEvent::Connection(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SyncConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            ..SyncConfig::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(5), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_config_validation() {
        assert!(SyncConfig::default().validate().is_ok());

        let config = SyncConfig {
            max_attempts: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            max_delay: Duration::from_millis(1),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
