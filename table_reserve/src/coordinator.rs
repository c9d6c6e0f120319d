//! Reservation coordination.
//!
//! Ties the three components together: a request is scored against the
//! tables the cache currently reports free, and either gets a tentative hold
//! on the best one or joins the waitlist. When the availability feed reports
//! a table freed, the first matching waitlisted party is notified and the
//! table is held for its confirmation window.
//!
//! An offer ends one of three ways:
//!
//! - Confirmed through [`ReservationCoordinator::confirm_offer`]: the hold
//!   becomes permanent.
//! - Cancelled or expired by staff: the hold is released and the table is
//!   offered to the next party.
//! - The window lapses: [`ReservationCoordinator::sweep_expired`] re-queues
//!   the party and offers the table again.

use crate::{
    db::{StoreError, TableRepository},
    reservation::ReservationRequest,
    scoring::{TableAssignmentResult, TableScorer},
    sync::{ReservationEvent, SharedCache, SyncEvent},
    table::{Table, TableId, TableStatus, TimeSlot},
    waitlist::{
        ContactInfo, ExpirySweep, Opening, SweepReport, WaitlistEntry, WaitlistError, WaitlistId,
        WaitlistManager, WaitlistRequest,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// How many times an opening is offered when candidates keep racing away
const MAX_OFFER_ATTEMPTS: usize = 3;

/// Coordinator errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Waitlist(#[from] WaitlistError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    /// Get a client-safe error message
    pub fn client_message(&self) -> String {
        match self {
            CoordinatorError::Validation(msg) => format!("Validation failed: {}", msg),
            CoordinatorError::Waitlist(e) => e.client_message(),
            CoordinatorError::Store(_) => "Internal server error".to_string(),
        }
    }
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Outcome of a table request
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// A table is held for the request
    Assigned(TableAssignmentResult),
    /// No satisfactory table; the request joined the waitlist
    Waitlisted(WaitlistEntry),
}

/// Coordinator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorConfig {
    /// Lowest score that counts as a satisfactory assignment
    pub min_acceptable_score: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            min_acceptable_score: 0.0,
        }
    }
}

/// A table held for one date and slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldTable {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub table_id: TableId,
}

/// A waitlist entry that accepted its offer
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedOffer {
    pub entry: WaitlistEntry,
    /// The table now held for the party. `None` if the offer had already
    /// lapsed or was made outside this coordinator.
    pub table: Option<HeldTable>,
}

type SlotKey = (NaiveDate, TimeSlot);

/// In-process tentative holds. `None` holds last until released; timed
/// holds cover a waitlisted party's confirmation window.
#[derive(Debug, Default)]
struct Holds {
    slots: HashMap<SlotKey, BTreeMap<TableId, Option<DateTime<Utc>>>>,
    /// Which entry each timed hold was offered to
    offers: HashMap<WaitlistId, (SlotKey, TableId)>,
    /// Lapsed holds not yet offered again
    lapsed: Vec<(SlotKey, TableId)>,
}

impl Holds {
    fn is_held(&self, key: &SlotKey, table: TableId, now: DateTime<Utc>) -> bool {
        self.slots
            .get(key)
            .and_then(|tables| tables.get(&table))
            .is_some_and(|until| until.is_none_or(|t| t > now))
    }

    fn hold(&mut self, key: SlotKey, table: TableId, until: Option<DateTime<Utc>>) {
        self.slots.entry(key).or_default().insert(table, until);
    }

    fn offer(
        &mut self,
        id: WaitlistId,
        key: SlotKey,
        table: TableId,
        until: Option<DateTime<Utc>>,
    ) {
        self.hold(key, table, until);
        self.offers.insert(id, (key, table));
    }

    fn release(&mut self, key: &SlotKey, table: TableId) -> bool {
        let Some(tables) = self.slots.get_mut(key) else {
            return false;
        };
        let removed = tables.remove(&table).is_some();
        if tables.is_empty() {
            self.slots.remove(key);
        }
        self.offers.retain(|_, held| *held != (*key, table));
        removed
    }

    /// Release the hold offered to an entry
    fn release_offer(&mut self, id: WaitlistId) -> Option<(SlotKey, TableId)> {
        let (key, table) = self.offers.remove(&id)?;
        self.release(&key, table).then_some((key, table))
    }

    /// Make an offered hold permanent. Returns the deadline it replaced so a
    /// failed confirmation can put it back.
    fn pin(
        &mut self,
        id: WaitlistId,
        now: DateTime<Utc>,
    ) -> Option<(SlotKey, TableId, Option<DateTime<Utc>>)> {
        self.prune(now);
        let (key, table) = self.offers.remove(&id)?;
        let until = self.slots.get_mut(&key)?.insert(table, None)?;
        Some((key, table, until))
    }

    /// Drop timed holds that lapsed at or before `now`. Dropped holds are
    /// kept aside until [`Holds::take_lapsed`] collects them.
    fn prune(&mut self, now: DateTime<Utc>) {
        let mut lapsed = Vec::new();
        self.slots.retain(|key, tables| {
            tables.retain(|table, until| {
                let live = until.is_none_or(|t| t > now);
                if !live {
                    lapsed.push((*key, *table));
                }
                live
            });
            !tables.is_empty()
        });

        if !lapsed.is_empty() {
            self.offers.retain(|_, held| !lapsed.contains(held));
            self.lapsed.extend(lapsed);
        }
    }

    fn take_lapsed(&mut self, now: DateTime<Utc>) -> Vec<(SlotKey, TableId)> {
        self.prune(now);
        std::mem::take(&mut self.lapsed)
    }

    fn held(&self, key: &SlotKey, now: DateTime<Utc>) -> Vec<TableId> {
        self.slots
            .get(key)
            .map(|tables| {
                tables
                    .iter()
                    .filter(|(_, until)| until.is_none_or(|t| t > now))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Reservation coordinator
pub struct ReservationCoordinator {
    tables: Arc<dyn TableRepository>,
    waitlist: Arc<WaitlistManager>,
    cache: SharedCache,
    scorer: TableScorer<'static>,
    config: CoordinatorConfig,
    holds: Mutex<Holds>,
}

impl ReservationCoordinator {
    pub fn new(
        tables: Arc<dyn TableRepository>,
        waitlist: Arc<WaitlistManager>,
        cache: SharedCache,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            tables,
            waitlist,
            cache,
            scorer: TableScorer::default(),
            config,
            holds: Mutex::new(Holds::default()),
        }
    }

    /// Use a custom scorer
    pub fn with_scorer(mut self, scorer: TableScorer<'static>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn waitlist(&self) -> &Arc<WaitlistManager> {
        &self.waitlist
    }

    /// Find a table for a request, or waitlist it
    ///
    /// # Arguments
    ///
    /// * `request` - Party size, date, slot and preferences
    /// * `contact` - Used only if the request ends up on the waitlist
    /// * `acceptable_slots` - Alternatives the guest would also take while waiting
    ///
    /// # Returns
    ///
    /// * `CoordinatorResult<Allocation>` - The held table or the new waitlist entry
    pub async fn request_table(
        &self,
        request: &ReservationRequest,
        contact: ContactInfo,
        acceptable_slots: &[TimeSlot],
    ) -> CoordinatorResult<Allocation> {
        if request.guest_count == 0 {
            return Err(CoordinatorError::Validation(
                "Guest count must be at least 1".to_string(),
            ));
        }
        if !self.waitlist.config().slot_grid.contains(request.time_slot) {
            return Err(CoordinatorError::Validation(format!(
                "Time slot {} is not on the seating grid",
                request.time_slot
            )));
        }

        let candidates = self.live_tables(request.date, request.time_slot).await?;
        let key = (request.date, request.time_slot);

        let assigned = {
            let mut holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Utc::now();
            holds.prune(now);
            let free: Vec<Table> = candidates
                .into_iter()
                .filter(|t| !holds.is_held(&key, t.id, now))
                .collect();

            match self.scorer.best(&free, request) {
                Some(best) if best.score >= self.config.min_acceptable_score => {
                    holds.hold(key, best.table.id, None);
                    Some(best)
                }
                _ => None,
            }
        };

        if let Some(best) = assigned {
            log::info!(
                "Assigned table {} ({}) to party of {} on {} {}",
                best.table.id,
                best.score,
                request.guest_count,
                request.date,
                request.time_slot
            );
            return Ok(Allocation::Assigned(best));
        }

        let entry = self
            .waitlist
            .enqueue(WaitlistRequest::from_reservation(
                request,
                contact,
                acceptable_slots,
            ))
            .await?;
        Ok(Allocation::Waitlisted(entry))
    }

    /// Drop a tentative hold. Returns false if there was none.
    pub fn release_hold(&self, date: NaiveDate, slot: TimeSlot, table_id: TableId) -> bool {
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(&(date, slot), table_id)
    }

    /// Tables currently held for a date and slot
    pub fn held_tables(&self, date: NaiveDate, slot: TimeSlot) -> Vec<TableId> {
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .held(&(date, slot), Utc::now())
    }

    /// Accept the table offered to a notified entry. The confirmation-window
    /// hold becomes permanent, so the table stays out of later requests.
    ///
    /// # Errors
    ///
    /// Fails like [`WaitlistManager::confirm`]; the hold is then left as it was.
    pub async fn confirm_offer(&self, id: WaitlistId) -> CoordinatorResult<ConfirmedOffer> {
        let pinned = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pin(id, Utc::now());

        let entry = match self.waitlist.confirm(id).await {
            Ok(entry) => entry,
            Err(e) => {
                if let Some((key, table, until)) = pinned {
                    self.holds
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .offer(id, key, table, until);
                }
                return Err(e.into());
            }
        };

        let table = pinned.map(|((date, time_slot), table_id, _)| HeldTable {
            date,
            time_slot,
            table_id,
        });
        match &table {
            Some(held) => log::info!(
                "Waitlist entry {} confirmed table {} on {} {}",
                id,
                held.table_id,
                held.date,
                held.time_slot
            ),
            None => log::warn!("Waitlist entry {} confirmed without a live offer", id),
        }

        Ok(ConfirmedOffer { entry, table })
    }

    /// Cancel an entry at the customer's request. A table offered to it is
    /// offered to the next party.
    pub async fn cancel_entry(&self, id: WaitlistId) -> CoordinatorResult<WaitlistEntry> {
        let entry = self.waitlist.cancel(id).await?;
        self.pass_on_offer(id).await;
        Ok(entry)
    }

    /// Close an entry as expired. A table offered to it is offered to the
    /// next party.
    pub async fn expire_entry(&self, id: WaitlistId) -> CoordinatorResult<WaitlistEntry> {
        let entry = self.waitlist.expire(id).await?;
        self.pass_on_offer(id).await;
        Ok(entry)
    }

    /// Re-queue lapsed waitlist offers and offer their tables again.
    ///
    /// The waitlist is swept first, so a party whose window lapsed is behind
    /// everyone already waiting when its table goes out again.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> CoordinatorResult<SweepReport> {
        let report = self.waitlist.sweep_expired(now).await?;

        let lapsed = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_lapsed(now);

        for ((date, slot), table_id) in lapsed {
            match self.offer(date, slot, table_id).await {
                Ok(Some(entry)) => log::info!(
                    "Lapsed offer of table {} on {} {} passed to waitlist entry {}",
                    table_id,
                    date,
                    slot,
                    entry.id
                ),
                Ok(None) => log::debug!(
                    "No taker for lapsed table {} on {} {}",
                    table_id,
                    date,
                    slot
                ),
                Err(e) => log::warn!("Failed to re-offer table {}: {}", table_id, e),
            }
        }

        Ok(report)
    }

    /// React to one availability event. Returns the entry that was notified,
    /// if any.
    pub async fn handle_event(&self, event: &SyncEvent) -> CoordinatorResult<Option<WaitlistEntry>> {
        match event {
            SyncEvent::Availability(update) if update.status.is_available() => {
                self.offer(update.date, update.time_slot, update.table_id)
                    .await
            }
            SyncEvent::Reservation(event) if event.event_type.frees_table() => {
                match opening_of(event) {
                    Some((date, slot, table_id)) => self.offer(date, slot, table_id).await,
                    None => {
                        log::debug!(
                            "Reservation event {} lacks table, date or slot",
                            event.reservation_id
                        );
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Consume events until the channel closes
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<SyncEvent>) {
        log::info!("Reservation coordinator listening for availability events");

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle_event(&event).await {
                        log::warn!("Failed to handle availability event: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Coordinator lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        log::info!("Reservation coordinator stopped");
    }

    async fn pass_on_offer(&self, id: WaitlistId) {
        let released = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release_offer(id);

        if let Some(((date, slot), table_id)) = released
            && let Err(e) = self.offer(date, slot, table_id).await
        {
            log::warn!("Failed to pass on table {} from entry {}: {}", table_id, id, e);
        }
    }

    /// Offer a freed table to the waitlist
    async fn offer(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
        table_id: TableId,
    ) -> CoordinatorResult<Option<WaitlistEntry>> {
        let key = (date, slot);
        if self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_held(&key, table_id, Utc::now())
        {
            return Ok(None);
        }

        let Some(table) = self.tables.find(table_id).await? else {
            log::warn!("Availability event for unknown table {}", table_id);
            return Ok(None);
        };
        if table.status == TableStatus::Maintenance {
            return Ok(None);
        }

        let opening = Opening {
            date,
            time_slot: slot,
            table: table.with_status(TableStatus::Available),
        };

        for _ in 0..MAX_OFFER_ATTEMPTS {
            let Some(candidate) = self.waitlist.next_candidate(&opening).await? else {
                return Ok(None);
            };

            let request = candidate.reservation_request(slot);
            if self
                .scorer
                .best(std::slice::from_ref(&opening.table), &request)
                .is_none()
            {
                return Ok(None);
            }

            match self.waitlist.notify(candidate.id).await {
                Ok(notified) => {
                    self.holds
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .offer(notified.id, key, table_id, notified.notification_expiry);
                    log::info!(
                        "Offered table {} on {} {} to waitlist entry {}",
                        table_id,
                        date,
                        slot,
                        notified.id
                    );
                    return Ok(Some(notified));
                }
                Err(WaitlistError::InvalidState { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Table definitions with live status laid over them
    async fn live_tables(&self, date: NaiveDate, slot: TimeSlot) -> CoordinatorResult<Vec<Table>> {
        let mut tables = self.tables.list().await?;
        let cache = self.cache.read().await;

        for table in &mut tables {
            if table.status == TableStatus::Maintenance {
                continue;
            }
            if let Some(status) = cache.slot_status(date, slot, table.id) {
                table.status = status;
            } else if let Some(update) = cache.table_status(table.id) {
                table.status = update.status;
            }
        }

        Ok(tables)
    }
}

#[async_trait]
impl ExpirySweep for ReservationCoordinator {
    type Error = CoordinatorError;

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoordinatorResult<SweepReport> {
        ReservationCoordinator::sweep_expired(self, now).await
    }
}

fn opening_of(event: &ReservationEvent) -> Option<(NaiveDate, TimeSlot, TableId)> {
    Some((event.date?, event.time_slot?, event.table_id?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{InMemoryTableRepository, InMemoryWaitlistRepository},
        notify::LogDispatcher,
        reservation::SeatingPreference,
        sync::{AvailabilityUpdate, ReservationEventType},
        table::LocationZone,
        waitlist::{WaitlistConfig, WaitlistStatus},
    };

    fn slot() -> TimeSlot {
        TimeSlot::from_hm(19, 0).unwrap()
    }

    fn date() -> NaiveDate {
        Utc::now().date_naive() + chrono::Duration::days(1)
    }

    fn coordinator(tables: Vec<Table>) -> (ReservationCoordinator, SharedCache) {
        coordinator_with(tables, WaitlistConfig::default())
    }

    fn coordinator_with(
        tables: Vec<Table>,
        config: WaitlistConfig,
    ) -> (ReservationCoordinator, SharedCache) {
        let waitlist = Arc::new(WaitlistManager::new(
            Arc::new(InMemoryWaitlistRepository::new()),
            Arc::new(LogDispatcher),
            config,
        ));
        let cache = SharedCache::new();
        let coordinator = ReservationCoordinator::new(
            Arc::new(InMemoryTableRepository::new().with_tables(tables)),
            waitlist,
            cache.clone(),
            CoordinatorConfig::default(),
        );
        (coordinator, cache)
    }

    fn contact() -> ContactInfo {
        ContactInfo::new("Ada").with_email("ada@example.com")
    }

    #[tokio::test]
    async fn test_assigns_best_table_and_holds_it() {
        let (coordinator, _) = coordinator(vec![
            Table::new(1, 1, 4, LocationZone::Indoor),
            Table::new(2, 2, 4, LocationZone::Outdoor),
        ]);
        let request = ReservationRequest::new(4, date(), slot())
            .with_preference(SeatingPreference::Outdoor);

        let Allocation::Assigned(first) = coordinator.request_table(&request, contact(), &[]).await.unwrap() else {
            panic!("expected assignment");
        };
        assert_eq!(first.table.id, 2);
        assert_eq!(coordinator.held_tables(date(), slot()), vec![2]);

        // The held table is skipped for the next request
        let Allocation::Assigned(second) = coordinator.request_table(&request, contact(), &[]).await.unwrap() else {
            panic!("expected assignment");
        };
        assert_eq!(second.table.id, 1);
    }

    #[tokio::test]
    async fn test_waitlists_when_nothing_fits() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        let request = ReservationRequest::new(4, date(), slot());

        let allocation = coordinator
            .request_table(&request, contact(), &[TimeSlot::from_hm(19, 30).unwrap()])
            .await
            .unwrap();
        let Allocation::Waitlisted(entry) = allocation else {
            panic!("expected waitlist");
        };
        assert_eq!(entry.position, Some(1));
        assert_eq!(entry.time_slots.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_status_overrides_inventory() {
        let (coordinator, cache) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        cache.write().await.apply_availability(&AvailabilityUpdate {
            date: date(),
            time_slot: slot(),
            table_id: 1,
            status: TableStatus::Reserved,
            timestamp: Utc::now(),
        });

        let request = ReservationRequest::new(2, date(), slot());
        let allocation = coordinator.request_table(&request, contact(), &[]).await.unwrap();
        assert!(matches!(allocation, Allocation::Waitlisted(_)));
    }

    #[tokio::test]
    async fn test_off_grid_slot_rejected() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        let request = ReservationRequest::new(2, date(), TimeSlot::from_hm(3, 0).unwrap());
        assert!(matches!(
            coordinator.request_table(&request, contact(), &[]).await,
            Err(CoordinatorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_freed_table_notifies_first_match() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        let big = ReservationRequest::new(6, date(), slot());
        let small = ReservationRequest::new(2, date(), slot());

        // Occupy the only table, then queue a party too big for it and one that fits
        coordinator.request_table(&small, contact(), &[]).await.unwrap();
        let Allocation::Waitlisted(big_entry) = coordinator.request_table(&big, contact(), &[]).await.unwrap() else {
            panic!("expected waitlist");
        };
        let Allocation::Waitlisted(small_entry) = coordinator.request_table(&small, contact(), &[]).await.unwrap() else {
            panic!("expected waitlist");
        };
        assert!(coordinator.release_hold(date(), slot(), 1));

        let event = SyncEvent::Reservation(ReservationEvent {
            event_type: ReservationEventType::TableFreed,
            table_id: Some(1),
            guest_count: Some(2),
            reservation_id: "r-1".to_string(),
            date: Some(date()),
            time_slot: Some(slot()),
            timestamp: Utc::now(),
        });
        let notified = coordinator.handle_event(&event).await.unwrap().unwrap();
        assert_eq!(notified.id, small_entry.id);
        assert_eq!(notified.status, WaitlistStatus::Notified);

        let big_entry = coordinator.waitlist().get(big_entry.id).await.unwrap();
        assert_eq!(big_entry.status, WaitlistStatus::Pending);

        // The offered table is held for the confirmation window
        assert_eq!(coordinator.held_tables(date(), slot()), vec![1]);
        assert!(coordinator.handle_event(&event).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_irrelevant_events_ignored() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        let update = |table_id, status| {
            SyncEvent::Availability(AvailabilityUpdate {
                date: date(),
                time_slot: slot(),
                table_id,
                status,
                timestamp: Utc::now(),
            })
        };

        let occupied = update(1, TableStatus::Occupied);
        assert!(coordinator.handle_event(&occupied).await.unwrap().is_none());

        let unknown = update(42, TableStatus::Available);
        assert!(coordinator.handle_event(&unknown).await.unwrap().is_none());
    }

    fn one_second_window() -> WaitlistConfig {
        WaitlistConfig {
            notification_window_secs: 1,
            ..WaitlistConfig::default()
        }
    }

    fn table_freed() -> SyncEvent {
        SyncEvent::Reservation(ReservationEvent {
            event_type: ReservationEventType::TableFreed,
            table_id: Some(1),
            guest_count: Some(2),
            reservation_id: "r-1".to_string(),
            date: Some(date()),
            time_slot: Some(slot()),
            timestamp: Utc::now(),
        })
    }

    /// Hold the only table, then queue `waiting` parties of two behind it
    async fn full_house(
        coordinator: &ReservationCoordinator,
        waiting: usize,
    ) -> Vec<WaitlistEntry> {
        let party = ReservationRequest::new(2, date(), slot());
        coordinator.request_table(&party, contact(), &[]).await.unwrap();

        let mut entries = Vec::new();
        for _ in 0..waiting {
            let Allocation::Waitlisted(entry) =
                coordinator.request_table(&party, contact(), &[]).await.unwrap()
            else {
                panic!("expected waitlist");
            };
            entries.push(entry);
        }
        assert!(coordinator.release_hold(date(), slot(), 1));
        entries
    }

    #[test]
    fn test_prune_drops_lapsed_holds() {
        let now = Utc::now();
        let later = now + chrono::Duration::seconds(10);
        let key = (date(), slot());
        let offered = uuid::Uuid::new_v4();

        let mut holds = Holds::default();
        holds.offer(offered, key, 1, Some(now + chrono::Duration::seconds(5)));
        holds.hold(key, 2, None);

        holds.prune(later);
        assert_eq!(holds.slots[&key].keys().copied().collect::<Vec<_>>(), vec![2]);
        assert!(holds.offers.is_empty());
        assert!(holds.pin(offered, later).is_none());

        assert_eq!(holds.take_lapsed(later), vec![(key, 1)]);
        assert!(holds.take_lapsed(later).is_empty());

        assert!(holds.release(&key, 2));
        assert!(holds.slots.is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_offer_outlives_window() {
        let (coordinator, _) = coordinator_with(
            vec![Table::new(1, 1, 2, LocationZone::Indoor)],
            one_second_window(),
        );
        let waiting = full_house(&coordinator, 1).await;

        let notified = coordinator.handle_event(&table_freed()).await.unwrap().unwrap();
        assert_eq!(notified.id, waiting[0].id);

        let confirmed = coordinator.confirm_offer(notified.id).await.unwrap();
        assert_eq!(confirmed.entry.status, WaitlistStatus::Confirmed);
        assert_eq!(
            confirmed.table,
            Some(HeldTable {
                date: date(),
                time_slot: slot(),
                table_id: 1,
            })
        );

        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

        assert_eq!(coordinator.held_tables(date(), slot()), vec![1]);
        let again = ReservationRequest::new(2, date(), slot());
        let allocation = coordinator.request_table(&again, contact(), &[]).await.unwrap();
        assert!(matches!(allocation, Allocation::Waitlisted(_)));
    }

    #[tokio::test]
    async fn test_failed_confirmation_keeps_timed_hold() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        full_house(&coordinator, 1).await;
        let notified = coordinator.handle_event(&table_freed()).await.unwrap().unwrap();

        // Closed behind the coordinator's back, so the offer is still on record
        coordinator.waitlist().expire(notified.id).await.unwrap();
        assert!(matches!(
            coordinator.confirm_offer(notified.id).await,
            Err(CoordinatorError::Waitlist(WaitlistError::InvalidState { .. }))
        ));
        assert_eq!(coordinator.held_tables(date(), slot()), vec![1]);

        // Still timed: it lapses instead of holding the table for good
        coordinator
            .sweep_expired(Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(coordinator.held_tables(date(), slot()).is_empty());
    }

    #[tokio::test]
    async fn test_lapsed_offer_passes_to_next_party() {
        let (coordinator, _) = coordinator_with(
            vec![Table::new(1, 1, 2, LocationZone::Indoor)],
            one_second_window(),
        );
        let waiting = full_house(&coordinator, 2).await;
        let (first, second) = (waiting[0].id, waiting[1].id);

        let notified = coordinator.handle_event(&table_freed()).await.unwrap().unwrap();
        assert_eq!(notified.id, first);

        let report = coordinator
            .sweep_expired(Utc::now() + chrono::Duration::seconds(2))
            .await
            .unwrap();
        assert_eq!(report.requeued, vec![first]);

        let first = coordinator.waitlist().get(first).await.unwrap();
        assert_eq!(first.status, WaitlistStatus::Pending);
        assert_eq!(first.position, Some(1));
        let second = coordinator.waitlist().get(second).await.unwrap();
        assert_eq!(second.status, WaitlistStatus::Notified);
        assert_eq!(coordinator.held_tables(date(), slot()), vec![1]);
    }

    #[tokio::test]
    async fn test_cancelled_offer_passes_to_next_party() {
        let (coordinator, _) = coordinator(vec![Table::new(1, 1, 2, LocationZone::Indoor)]);
        let waiting = full_house(&coordinator, 2).await;

        let notified = coordinator.handle_event(&table_freed()).await.unwrap().unwrap();
        assert_eq!(notified.id, waiting[0].id);

        let cancelled = coordinator.cancel_entry(notified.id).await.unwrap();
        assert_eq!(cancelled.status, WaitlistStatus::Cancelled);

        let next = coordinator.waitlist().get(waiting[1].id).await.unwrap();
        assert_eq!(next.status, WaitlistStatus::Notified);
        assert_eq!(coordinator.held_tables(date(), slot()), vec![1]);
    }
}
