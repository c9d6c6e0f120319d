//! Waitlist manager: queue ordering and the entry state machine.

use super::{
    config::WaitlistConfig,
    errors::{WaitlistError, WaitlistResult},
    models::{
        ContactInfo, Opening, QueuePosition, SearchCriteria, SweepReport, WaitlistEntry,
        WaitlistId, WaitlistRequest, WaitlistStatus, normalize_phone,
    },
    turnover::TurnoverTracker,
};
use crate::{
    db::{StoreError, WaitlistRepository},
    notify::{NotificationDispatcher, NotificationTemplate},
    table::TimeSlot,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// State owned by whoever holds the writer lock
#[derive(Debug)]
struct WriterState {
    /// Last `queued_at` handed out; stamps are strictly increasing
    last_stamp: DateTime<Utc>,
    /// Set when a recompute failed after a committed transition
    positions_stale: bool,
}

impl WriterState {
    /// Wall-clock stamp, bumped past the previous one when the clock stalls.
    /// Microsecond steps survive a round trip through PostgreSQL.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + Duration::microseconds(1)
        };
        self.last_stamp = stamp;
        stamp
    }
}

/// Waitlist manager
///
/// Every mutation runs under a single writer lock and is written with a
/// compare-and-update on the entry's status, so two operations racing on
/// the same entry resolve to one winner and one [`WaitlistError::InvalidState`].
pub struct WaitlistManager {
    repo: Arc<dyn WaitlistRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: WaitlistConfig,
    turnover: Mutex<TurnoverTracker>,
    writer: AsyncMutex<WriterState>,
}

impl WaitlistManager {
    /// Create a new waitlist manager
    ///
    /// # Arguments
    ///
    /// * `repo` - Waitlist store
    /// * `dispatcher` - Notification sink; failures are logged, never propagated
    /// * `config` - Queue configuration
    pub fn new(
        repo: Arc<dyn WaitlistRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: WaitlistConfig,
    ) -> Self {
        let turnover = TurnoverTracker::new(config.turnover_samples, config.default_turnover_minutes);
        Self {
            repo,
            dispatcher,
            config,
            turnover: Mutex::new(turnover),
            writer: AsyncMutex::new(WriterState {
                last_stamp: DateTime::<Utc>::MIN_UTC,
                positions_stale: false,
            }),
        }
    }

    pub fn config(&self) -> &WaitlistConfig {
        &self.config
    }

    /// Add a request to the waitlist
    ///
    /// # Arguments
    ///
    /// * `request` - Party, contact details and acceptable slots
    ///
    /// # Returns
    ///
    /// * `WaitlistResult<WaitlistEntry>` - The pending entry with its position
    ///   and estimated wait, or a validation error
    pub async fn enqueue(&self, request: WaitlistRequest) -> WaitlistResult<WaitlistEntry> {
        let request = self.validate(request, Utc::now().date_naive())?;
        let priority = self
            .config
            .priority_for(request.guest_count, request.occasion.as_deref());

        let mut writer = self.writer.lock().await;
        let now = writer.next_stamp();

        let mut entry = WaitlistEntry {
            id: Uuid::new_v4(),
            name: request.contact.name,
            email: request.contact.email,
            phone: request.contact.phone,
            guest_count: request.guest_count,
            preferred_date: request.preferred_date,
            time_slots: request.time_slots,
            seating_preference: request.seating_preference,
            occasion: request.occasion,
            special_requests: request.special_requests,
            dietary_notes: request.dietary_notes,
            status: WaitlistStatus::Pending,
            priority,
            position: None,
            estimated_wait_minutes: None,
            notification_expiry: None,
            notified_at: None,
            queued_at: now,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert(&entry).await?;
        if let Some(positions) = self.recompute_logged(&mut writer).await
            && let Some(p) = positions.iter().find(|p| p.id == entry.id)
        {
            entry.position = Some(p.position);
            entry.estimated_wait_minutes = Some(p.estimated_wait_minutes);
        }
        drop(writer);

        log::info!(
            "Waitlisted {} ({} guests, {} tier) at position {:?}",
            entry.id,
            entry.guest_count,
            entry.priority,
            entry.position
        );

        self.send(&entry, NotificationTemplate::Waitlisted).await;
        Ok(entry)
    }

    /// Fetch an entry in any state
    pub async fn get(&self, id: WaitlistId) -> WaitlistResult<WaitlistEntry> {
        self.repo
            .find(id)
            .await?
            .ok_or(WaitlistError::NotFound(id))
    }

    /// Non-terminal entries matching any of the criteria
    pub async fn search(&self, criteria: &SearchCriteria) -> WaitlistResult<Vec<WaitlistEntry>> {
        if criteria.is_empty() {
            return Err(WaitlistError::Validation(
                "Search requires an id, email or phone".to_string(),
            ));
        }

        let mut found = self.repo.search(criteria).await?;
        found.retain(|e| !e.status.is_terminal());
        Ok(found)
    }

    /// Pending entries in queue order
    pub async fn pending_entries(&self) -> WaitlistResult<Vec<WaitlistEntry>> {
        let mut pending = self.repo.list_by_status(&[WaitlistStatus::Pending]).await?;
        pending.sort_by(WaitlistEntry::queue_cmp);
        Ok(pending)
    }

    /// First pending entry, in queue order, that would take the opening
    pub async fn next_candidate(&self, opening: &Opening) -> WaitlistResult<Option<WaitlistEntry>> {
        let pending = self.pending_entries().await?;
        Ok(pending.into_iter().find(|e| {
            e.accepts(opening.date, opening.time_slot) && opening.table.fits(e.guest_count)
        }))
    }

    /// Tell a pending entry that a table is ready
    ///
    /// Starts the confirmation window. The entry leaves the queue, so the
    /// remaining positions are recomputed.
    pub async fn notify(&self, id: WaitlistId) -> WaitlistResult<WaitlistEntry> {
        let window = self.config.notification_window();
        let entry = self
            .transition(id, &[WaitlistStatus::Pending], "pending", |entry, now| {
                entry.status = WaitlistStatus::Notified;
                entry.notification_expiry = Some(now + window);
                entry.notified_at = Some(now);
                entry.position = None;
                entry.estimated_wait_minutes = None;
            })
            .await?;

        if let Some(expires_at) = entry.notification_expiry {
            self.send(&entry, NotificationTemplate::TableReady { expires_at })
                .await;
        }
        Ok(entry)
    }

    /// Accept the table offered to a notified entry
    pub async fn confirm(&self, id: WaitlistId) -> WaitlistResult<WaitlistEntry> {
        let entry = self
            .transition(id, &[WaitlistStatus::Notified], "notified", |entry, _| {
                entry.status = WaitlistStatus::Confirmed;
                entry.notification_expiry = None;
            })
            .await?;

        self.turnover
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_seating(entry.updated_at);

        self.send(&entry, NotificationTemplate::Confirmed).await;
        Ok(entry)
    }

    /// Withdraw an entry at the customer's request
    pub async fn cancel(&self, id: WaitlistId) -> WaitlistResult<WaitlistEntry> {
        let entry = self
            .transition(
                id,
                &[WaitlistStatus::Pending, WaitlistStatus::Notified],
                "pending or notified",
                |entry, _| {
                    entry.status = WaitlistStatus::Cancelled;
                    entry.notification_expiry = None;
                    entry.position = None;
                    entry.estimated_wait_minutes = None;
                },
            )
            .await?;

        self.send(&entry, NotificationTemplate::Cancelled).await;
        Ok(entry)
    }

    /// Remove an entry without seating it. Staff action only; a lapsed
    /// confirmation window re-queues instead.
    pub async fn expire(&self, id: WaitlistId) -> WaitlistResult<WaitlistEntry> {
        let entry = self
            .transition(
                id,
                &[WaitlistStatus::Pending, WaitlistStatus::Notified],
                "pending or notified",
                |entry, _| {
                    entry.status = WaitlistStatus::Expired;
                    entry.notification_expiry = None;
                    entry.position = None;
                    entry.estimated_wait_minutes = None;
                },
            )
            .await?;

        self.send(&entry, NotificationTemplate::Expired).await;
        Ok(entry)
    }

    /// Re-queue every notified entry whose window closed at or before `now`.
    ///
    /// Each entry is written independently: one failure is recorded in the
    /// report and does not stop the rest. Running it twice is harmless.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> WaitlistResult<SweepReport> {
        let mut writer = self.writer.lock().await;
        let notified = self.repo.list_by_status(&[WaitlistStatus::Notified]).await?;

        let mut report = SweepReport::default();
        let mut requeued = Vec::new();

        for mut entry in notified {
            if entry.notification_expiry.is_none_or(|expiry| expiry > now) {
                continue;
            }

            let stamp = writer.next_stamp();
            entry.status = WaitlistStatus::Pending;
            entry.notification_expiry = None;
            entry.queued_at = stamp;
            entry.updated_at = stamp;

            match self
                .repo
                .compare_and_update(&entry, WaitlistStatus::Notified)
                .await
            {
                Ok(()) => {
                    report.requeued.push(entry.id);
                    requeued.push(entry);
                }
                Err(StoreError::Conflict(_)) => {
                    log::debug!("Sweep skipped {}: changed concurrently", entry.id);
                    report.skipped.push(entry.id);
                }
                Err(e) => {
                    log::warn!("Sweep failed to re-queue {}: {}", entry.id, e);
                    report.failed.push((entry.id, e.to_string()));
                }
            }
        }

        if !report.requeued.is_empty() || writer.positions_stale {
            report.positions_recomputed = self.recompute_logged(&mut writer).await.is_some();
        }
        drop(writer);

        if !report.requeued.is_empty() {
            log::info!("Sweep re-queued {} entries", report.requeued.len());
        }
        for entry in &requeued {
            self.send(entry, NotificationTemplate::Requeued).await;
        }

        Ok(report)
    }

    /// Re-derive position and estimated wait for every pending entry
    pub async fn recompute_positions(&self) -> WaitlistResult<Vec<QueuePosition>> {
        let mut writer = self.writer.lock().await;
        let positions = self.recompute_locked().await?;
        writer.positions_stale = false;
        Ok(positions)
    }

    async fn recompute_locked(&self) -> WaitlistResult<Vec<QueuePosition>> {
        let pending = self.pending_entries().await?;

        let positions: Vec<QueuePosition> = {
            let turnover = self.turnover.lock().unwrap_or_else(PoisonError::into_inner);
            pending
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let position = u32::try_from(i + 1).unwrap_or(u32::MAX);
                    QueuePosition {
                        id: entry.id,
                        position,
                        estimated_wait_minutes: turnover.estimate_wait(position),
                    }
                })
                .collect()
        };

        self.repo.update_queue_positions(&positions).await?;
        Ok(positions)
    }

    /// Recompute after a committed transition. A failure leaves the positions
    /// stale until the next sweep instead of failing the caller.
    async fn recompute_logged(&self, writer: &mut WriterState) -> Option<Vec<QueuePosition>> {
        match self.recompute_locked().await {
            Ok(positions) => {
                writer.positions_stale = false;
                Some(positions)
            }
            Err(e) => {
                log::warn!("Queue position recompute failed: {}", e);
                writer.positions_stale = true;
                None
            }
        }
    }

    async fn transition<F>(
        &self,
        id: WaitlistId,
        allowed: &[WaitlistStatus],
        expected: &'static str,
        apply: F,
    ) -> WaitlistResult<WaitlistEntry>
    where
        F: FnOnce(&mut WaitlistEntry, DateTime<Utc>),
    {
        let mut writer = self.writer.lock().await;

        let mut entry = self.get(id).await?;
        if !allowed.contains(&entry.status) {
            return Err(WaitlistError::InvalidState {
                id,
                expected,
                actual: entry.status,
            });
        }

        let previous = entry.status;
        let now = writer.next_stamp();
        apply(&mut entry, now);
        entry.updated_at = now;

        match self.repo.compare_and_update(&entry, previous).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                let current = self.get(id).await?;
                return Err(WaitlistError::InvalidState {
                    id,
                    expected,
                    actual: current.status,
                });
            }
            Err(e) => return Err(e.into()),
        }

        log::info!("Waitlist entry {}: {} -> {}", id, previous, entry.status);

        if previous == WaitlistStatus::Pending || entry.status == WaitlistStatus::Pending {
            self.recompute_logged(&mut writer).await;
        }
        Ok(entry)
    }

    async fn send(&self, entry: &WaitlistEntry, template: NotificationTemplate) {
        if let Err(e) = self.dispatcher.dispatch(entry, &template).await {
            log::warn!("Notification for {} failed: {}", entry.id, e);
        }
    }

    /// Check and normalize an incoming request
    fn validate(&self, request: WaitlistRequest, today: NaiveDate) -> WaitlistResult<WaitlistRequest> {
        if request.guest_count == 0 {
            return invalid("Guest count must be at least 1");
        }

        let name = request.contact.name.trim().to_string();
        if name.is_empty() {
            return invalid("Name is required");
        }

        let email = request
            .contact
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        if let Some(email) = &email
            && !email.contains('@')
        {
            return invalid("Email address is malformed");
        }

        let phone = request
            .contact
            .phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty());

        if email.is_none() && phone.is_none() {
            return invalid("An email address or phone number is required");
        }

        if request.preferred_date < today {
            return invalid("Preferred date is in the past");
        }

        if request.time_slots.is_empty() {
            return invalid("At least one acceptable time slot is required");
        }

        let mut time_slots: Vec<TimeSlot> = Vec::with_capacity(request.time_slots.len());
        for slot in request.time_slots {
            if !self.config.slot_grid.contains(slot) {
                return Err(WaitlistError::Validation(format!(
                    "Time slot {} is not on the seating grid",
                    slot
                )));
            }
            if !time_slots.contains(&slot) {
                time_slots.push(slot);
            }
        }

        let non_blank = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(WaitlistRequest {
            contact: ContactInfo { name, email, phone },
            time_slots,
            occasion: non_blank(request.occasion),
            special_requests: non_blank(request.special_requests),
            dietary_notes: non_blank(request.dietary_notes),
            ..request
        })
    }
}

fn invalid<T>(msg: &str) -> WaitlistResult<T> {
    Err(WaitlistError::Validation(msg.to_string()))
}
