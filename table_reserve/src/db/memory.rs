//! In-memory repositories.
//!
//! Used by tests and by the server when no `DATABASE_URL` is configured.
//! They honor the same compare-and-update contract as the PostgreSQL
//! implementations.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use super::errors::{StoreError, StoreResult};
use super::repository::{TableRepository, WaitlistRepository};
use crate::table::{Table, TableId, TableStatus};
use crate::waitlist::{QueuePosition, SearchCriteria, WaitlistEntry, WaitlistId, WaitlistStatus};

/// Waitlist store backed by a `HashMap`
#[derive(Debug, Default, Clone)]
pub struct InMemoryWaitlistRepository {
    entries: Arc<Mutex<HashMap<WaitlistId, WaitlistEntry>>>,
}

impl InMemoryWaitlistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload an entry, bypassing validation
    pub fn with_entry(self, entry: WaitlistEntry) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.id, entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WaitlistRepository for InMemoryWaitlistRepository {
    async fn insert(&self, entry: &WaitlistEntry) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&entry.id) {
            return Err(StoreError::Conflict(entry.id.to_string()));
        }
        entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn find(&self, id: WaitlistId) -> StoreResult<Option<WaitlistEntry>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&id).cloned())
    }

    async fn list_by_status(&self, statuses: &[WaitlistStatus]) -> StoreResult<Vec<WaitlistEntry>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<WaitlistEntry> = entries
            .values()
            .filter(|e| statuses.contains(&e.status))
            .cloned()
            .collect();
        found.sort_by(WaitlistEntry::queue_cmp);
        Ok(found)
    }

    async fn search(&self, criteria: &SearchCriteria) -> StoreResult<Vec<WaitlistEntry>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<WaitlistEntry> = entries
            .values()
            .filter(|e| criteria.matches(e))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn compare_and_update(
        &self,
        entry: &WaitlistEntry,
        expected: WaitlistStatus,
    ) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&entry.id) {
            Some(stored) if stored.status == expected => {
                *stored = entry.clone();
                Ok(())
            }
            _ => Err(StoreError::Conflict(entry.id.to_string())),
        }
    }

    async fn update_queue_positions(&self, positions: &[QueuePosition]) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for p in positions {
            if let Some(entry) = entries.get_mut(&p.id)
                && entry.status == WaitlistStatus::Pending
            {
                entry.position = Some(p.position);
                entry.estimated_wait_minutes = Some(p.estimated_wait_minutes);
            }
        }
        Ok(())
    }
}

/// Table inventory backed by a `BTreeMap`, so listing is ordered by ID
#[derive(Debug, Default, Clone)]
pub struct InMemoryTableRepository {
    tables: Arc<Mutex<BTreeMap<TableId, Table>>>,
}

impl InMemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the inventory
    pub fn with_tables(self, tables: impl IntoIterator<Item = Table>) -> Self {
        {
            let mut stored = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            for table in tables {
                stored.insert(table.id, table);
            }
        }
        self
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn list(&self) -> StoreResult<Vec<Table>> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.values().cloned().collect())
    }

    async fn find(&self, id: TableId) -> StoreResult<Option<Table>> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(&id).cloned())
    }

    async fn upsert(&self, table: &Table) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.insert(table.id, table.clone());
        Ok(())
    }

    async fn update_status(&self, id: TableId, status: TableStatus) -> StoreResult<bool> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        match tables.get_mut(&id) {
            Some(table) => {
                table.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reservation::SeatingPreference,
        table::{LocationZone, TimeSlot},
        waitlist::PriorityTier,
    };
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn entry(status: WaitlistStatus) -> WaitlistEntry {
        let now = Utc::now();
        WaitlistEntry {
            id: Uuid::new_v4(),
            name: "Linus".to_string(),
            email: Some("linus@example.com".to_string()),
            phone: None,
            guest_count: 2,
            preferred_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            time_slots: vec![TimeSlot::from_hm(18, 0).unwrap()],
            seating_preference: SeatingPreference::NoPreference,
            occasion: None,
            special_requests: None,
            dietary_notes: None,
            status,
            priority: PriorityTier::Standard,
            position: None,
            estimated_wait_minutes: None,
            notification_expiry: None,
            notified_at: None,
            queued_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryWaitlistRepository::new();
        let e = entry(WaitlistStatus::Pending);
        repo.insert(&e).await.unwrap();

        assert_eq!(repo.find(e.id).await.unwrap(), Some(e.clone()));
        assert!(matches!(
            repo.insert(&e).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(repo.find(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_update_detects_conflict() {
        let repo = InMemoryWaitlistRepository::new();
        let mut e = entry(WaitlistStatus::Pending);
        repo.insert(&e).await.unwrap();

        e.status = WaitlistStatus::Cancelled;
        repo.compare_and_update(&e, WaitlistStatus::Pending)
            .await
            .unwrap();

        // A second writer that still believes the entry is pending loses
        e.status = WaitlistStatus::Notified;
        assert!(matches!(
            repo.compare_and_update(&e, WaitlistStatus::Pending).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            repo.find(e.id).await.unwrap().unwrap().status,
            WaitlistStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_queue_positions_only_touch_pending() {
        let pending = entry(WaitlistStatus::Pending);
        let notified = entry(WaitlistStatus::Notified);
        let repo = InMemoryWaitlistRepository::new()
            .with_entry(pending.clone())
            .with_entry(notified.clone());

        repo.update_queue_positions(&[
            QueuePosition {
                id: pending.id,
                position: 1,
                estimated_wait_minutes: 15,
            },
            QueuePosition {
                id: notified.id,
                position: 2,
                estimated_wait_minutes: 30,
            },
        ])
        .await
        .unwrap();

        let updated = repo.find(pending.id).await.unwrap().unwrap();
        assert_eq!(updated.position, Some(1));
        assert_eq!(updated.updated_at, pending.updated_at);
        assert_eq!(repo.find(notified.id).await.unwrap().unwrap().position, None);
    }

    #[tokio::test]
    async fn test_search_and_list() {
        let a = entry(WaitlistStatus::Pending);
        let b = entry(WaitlistStatus::Confirmed);
        let repo = InMemoryWaitlistRepository::new()
            .with_entry(a.clone())
            .with_entry(b.clone());

        let found = repo
            .search(&SearchCriteria::by_email("LINUS@example.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let pending = repo
            .list_by_status(&[WaitlistStatus::Pending])
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }

    #[tokio::test]
    async fn test_table_repository() {
        let repo = InMemoryTableRepository::new().with_tables([
            Table::new(2, 2, 4, LocationZone::Indoor),
            Table::new(1, 1, 2, LocationZone::Bar),
        ]);

        let ids: Vec<_> = repo.list().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(repo.update_status(2, TableStatus::Occupied).await.unwrap());
        assert!(!repo.update_status(99, TableStatus::Occupied).await.unwrap());
        assert_eq!(
            repo.find(2).await.unwrap().unwrap().status,
            TableStatus::Occupied
        );
    }
}
