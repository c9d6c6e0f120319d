//! Local availability cache with last-write-wins semantics.

use super::messages::{AvailabilitySnapshot, AvailabilityUpdate, TableStatusUpdate};
use crate::table::{TableId, TableStatus, TimeSlot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamped {
    status: TableStatus,
    timestamp: DateTime<Utc>,
}

/// Per-table statuses for one date and slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSummary {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub statuses: BTreeMap<TableId, TableStatus>,
}

impl SlotSummary {
    /// Tables reported available, in ID order
    pub fn available_tables(&self) -> Vec<TableId> {
        self.statuses
            .iter()
            .filter(|(_, status)| status.is_available())
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Cached view of slot and table status.
///
/// An update is applied only if it is at least as new as what is stored for
/// the same key. Older updates are dropped.
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    slots: HashMap<(NaiveDate, TimeSlot), BTreeMap<TableId, Stamped>>,
    tables: HashMap<TableId, TableStatusUpdate>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a slot-level update. Returns false if it was stale.
    pub fn apply_availability(&mut self, update: &AvailabilityUpdate) -> bool {
        let slot = self
            .slots
            .entry((update.date, update.time_slot))
            .or_default();

        if let Some(current) = slot.get(&update.table_id)
            && current.timestamp > update.timestamp
        {
            return false;
        }

        slot.insert(
            update.table_id,
            Stamped {
                status: update.status,
                timestamp: update.timestamp,
            },
        );
        true
    }

    /// Apply a table-level update. Returns false if it was stale.
    pub fn apply_table_status(&mut self, update: &TableStatusUpdate) -> bool {
        if let Some(current) = self.tables.get(&update.table_id)
            && current.timestamp > update.timestamp
        {
            return false;
        }

        self.tables.insert(update.table_id, update.clone());
        true
    }

    pub fn slot_status(&self, date: NaiveDate, slot: TimeSlot, table: TableId) -> Option<TableStatus> {
        self.slots
            .get(&(date, slot))
            .and_then(|tables| tables.get(&table))
            .map(|s| s.status)
    }

    pub fn table_status(&self, table: TableId) -> Option<TableStatusUpdate> {
        self.tables.get(&table).cloned()
    }

    pub fn slot_summary(&self, date: NaiveDate, slot: TimeSlot) -> SlotSummary {
        let statuses = self
            .slots
            .get(&(date, slot))
            .map(|tables| tables.iter().map(|(id, s)| (*id, s.status)).collect())
            .unwrap_or_default();

        SlotSummary {
            date,
            time_slot: slot,
            statuses,
        }
    }

    /// Every cached update for a date, optionally narrowed to one slot,
    /// plus all table-level statuses. Slots and tables come out in order.
    pub fn snapshot(&self, date: NaiveDate, time_slot: Option<TimeSlot>) -> AvailabilitySnapshot {
        let mut keys: Vec<&(NaiveDate, TimeSlot)> = self
            .slots
            .keys()
            .filter(|(d, s)| *d == date && time_slot.is_none_or(|wanted| wanted == *s))
            .collect();
        keys.sort_unstable();

        let mut slots = Vec::new();
        for key in keys {
            if let Some(tables) = self.slots.get(key) {
                slots.extend(tables.iter().map(|(id, stamped)| AvailabilityUpdate {
                    date: key.0,
                    time_slot: key.1,
                    table_id: *id,
                    status: stamped.status,
                    timestamp: stamped.timestamp,
                }));
            }
        }

        let mut tables: Vec<TableStatusUpdate> = self.tables.values().cloned().collect();
        tables.sort_by_key(|t| t.table_id);

        AvailabilitySnapshot {
            date,
            time_slot,
            slots,
            tables,
            timestamp: Utc::now(),
        }
    }

    /// Drop every slot cached for a date
    pub fn forget_date(&mut self, date: NaiveDate) {
        self.slots.retain(|(d, _), _| *d != date);
    }

    /// Dates with at least one cached slot
    pub fn cached_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.slots.keys().map(|(d, _)| *d).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

/// Cache shared between one writer and any number of readers
#[derive(Debug, Clone, Default)]
pub struct SharedCache(Arc<RwLock<AvailabilityCache>>);

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, AvailabilityCache> {
        self.0.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, AvailabilityCache> {
        self.0.write().await
    }

    pub async fn slot_status(&self, date: NaiveDate, slot: TimeSlot, table: TableId) -> Option<TableStatus> {
        self.read().await.slot_status(date, slot, table)
    }

    pub async fn table_status(&self, table: TableId) -> Option<TableStatusUpdate> {
        self.read().await.table_status(table)
    }

    pub async fn slot_summary(&self, date: NaiveDate, slot: TimeSlot) -> SlotSummary {
        self.read().await.slot_summary(date, slot)
    }

    pub async fn snapshot(&self, date: NaiveDate, time_slot: Option<TimeSlot>) -> AvailabilitySnapshot {
        self.read().await.snapshot(date, time_slot)
    }
}
