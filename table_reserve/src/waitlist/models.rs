//! Waitlist data models.

use crate::{
    reservation::{ReservationRequest, SeatingPreference},
    table::{Table, TimeSlot},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Waitlist entry ID type
pub type WaitlistId = Uuid;

/// Waitlist entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitlistStatus {
    /// Waiting for a table
    Pending,
    /// Told a table is ready, waiting for confirmation
    Notified,
    /// Accepted the table
    Confirmed,
    /// Removed by staff without seating
    Expired,
    /// Withdrawn by the customer
    Cancelled,
}

impl WaitlistStatus {
    /// Terminal states are immutable history
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WaitlistStatus::Confirmed | WaitlistStatus::Expired | WaitlistStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: WaitlistStatus) -> bool {
        use WaitlistStatus::*;
        matches!(
            (self, next),
            (Pending, Notified)
                | (Notified, Confirmed)
                | (Notified, Pending)
                | (Pending | Notified, Cancelled)
                | (Pending | Notified, Expired)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Pending => "pending",
            WaitlistStatus::Notified => "notified",
            WaitlistStatus::Confirmed => "confirmed",
            WaitlistStatus::Expired => "expired",
            WaitlistStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WaitlistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WaitlistStatus::Pending),
            "notified" => Ok(WaitlistStatus::Notified),
            "confirmed" => Ok(WaitlistStatus::Confirmed),
            "expired" => Ok(WaitlistStatus::Expired),
            "cancelled" => Ok(WaitlistStatus::Cancelled),
            other => Err(format!("Unknown waitlist status: {}", other)),
        }
    }
}

/// Coarse priority bucket. Higher tiers are served before lower ones,
/// regardless of how long the lower-tier entries have waited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Standard,
    LargeParty,
    SpecialOccasion,
}

impl PriorityTier {
    /// Numeric rank stored in the database
    pub fn rank(&self) -> i16 {
        match self {
            PriorityTier::Standard => 0,
            PriorityTier::LargeParty => 1,
            PriorityTier::SpecialOccasion => 2,
        }
    }

    /// Inverse of [`rank`](Self::rank)
    pub fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            0 => Some(PriorityTier::Standard),
            1 => Some(PriorityTier::LargeParty),
            2 => Some(PriorityTier::SpecialOccasion),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityTier::Standard => write!(f, "standard"),
            PriorityTier::LargeParty => write!(f, "large_party"),
            PriorityTier::SpecialOccasion => write!(f, "special_occasion"),
        }
    }
}

/// Customer identity and contact channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Input to [`WaitlistManager::enqueue`](super::WaitlistManager::enqueue)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistRequest {
    pub contact: ContactInfo,
    pub guest_count: u32,
    pub preferred_date: NaiveDate,
    /// Acceptable slots, most preferred first
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub seating_preference: SeatingPreference,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub dietary_notes: Option<String>,
}

impl WaitlistRequest {
    /// Seed a waitlist request from an unsatisfied reservation request
    pub fn from_reservation(
        request: &ReservationRequest,
        contact: ContactInfo,
        acceptable_slots: &[TimeSlot],
    ) -> Self {
        let mut time_slots = vec![request.time_slot];
        time_slots.extend(
            acceptable_slots
                .iter()
                .copied()
                .filter(|s| *s != request.time_slot),
        );

        Self {
            contact,
            guest_count: request.guest_count,
            preferred_date: request.date,
            time_slots,
            seating_preference: request.seating_preference,
            occasion: request.occasion.clone(),
            special_requests: None,
            dietary_notes: None,
        }
    }
}

/// A queued request for a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: WaitlistId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guest_count: u32,
    pub preferred_date: NaiveDate,
    pub time_slots: Vec<TimeSlot>,
    pub seating_preference: SeatingPreference,
    pub occasion: Option<String>,
    pub special_requests: Option<String>,
    pub dietary_notes: Option<String>,
    pub status: WaitlistStatus,
    pub priority: PriorityTier,
    /// 1-based place in the queue; only set while pending
    pub position: Option<u32>,
    /// Derived estimate; only set while pending
    pub estimated_wait_minutes: Option<u32>,
    /// Deadline to confirm; only set while notified
    pub notification_expiry: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
    /// Start of the current wait; reset when a missed notification re-queues the entry
    pub queued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Whether the entry would take a table on this date and slot
    pub fn accepts(&self, date: NaiveDate, slot: TimeSlot) -> bool {
        self.preferred_date == date && self.time_slots.contains(&slot)
    }

    /// Reservation request the entry represents for a given slot
    pub fn reservation_request(&self, slot: TimeSlot) -> ReservationRequest {
        ReservationRequest {
            guest_count: self.guest_count,
            date: self.preferred_date,
            time_slot: slot,
            seating_preference: self.seating_preference,
            occasion: self.occasion.clone(),
        }
    }

    /// Queue order: priority descending, then wait start, then ID
    pub fn queue_cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.queued_at.cmp(&other.queued_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Lookup criteria. An entry matches when it matches any criterion given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub id: Option<WaitlistId>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl SearchCriteria {
    pub fn by_id(id: WaitlistId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn by_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.email.as_deref().is_none_or(|e| e.trim().is_empty())
            && self.phone.as_deref().is_none_or(|p| normalize_phone(p).is_empty())
    }

    /// Check an entry against the criteria
    pub fn matches(&self, entry: &WaitlistEntry) -> bool {
        let id_match = self.id.is_some_and(|id| id == entry.id);
        let email_match = match (&self.email, &entry.email) {
            (Some(wanted), Some(actual)) => {
                let wanted = wanted.trim();
                !wanted.is_empty() && wanted.eq_ignore_ascii_case(actual.trim())
            }
            _ => false,
        };
        let phone_match = match (&self.phone, &entry.phone) {
            (Some(wanted), Some(actual)) => {
                let wanted = normalize_phone(wanted);
                !wanted.is_empty() && wanted == normalize_phone(actual)
            }
            _ => false,
        };

        id_match || email_match || phone_match
    }
}

/// Strip formatting from a phone number, keeping digits and a leading `+`
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') && !normalized.is_empty() {
        normalized.insert(0, '+');
    }
    normalized
}

/// Derived queue fields for one pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePosition {
    pub id: WaitlistId,
    pub position: u32,
    pub estimated_wait_minutes: u32,
}

/// A table that just became free for a date and slot
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub table: Table,
}

/// Outcome of one expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries moved back to pending
    pub requeued: Vec<WaitlistId>,
    /// Entries skipped because they changed during the sweep
    pub skipped: Vec<WaitlistId>,
    /// Entries that could not be written, with the error text
    pub failed: Vec<(WaitlistId, String)>,
    /// Whether positions were recomputed after the sweep
    pub positions_recomputed: bool,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}
