//! Repository trait definitions for testability and dependency injection.
//!
//! The waitlist manager and the reservation coordinator only ever see these
//! traits. PostgreSQL implementations live here; in-memory ones live in
//! [`super::memory`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::BTreeSet;

use super::errors::{StoreError, StoreResult};
use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};
use crate::table::{LayoutPosition, Table, TableId, TableStatus, TimeSlot};
use crate::waitlist::{
    PriorityTier, QueuePosition, SearchCriteria, WaitlistEntry, WaitlistId, WaitlistStatus,
    normalize_phone,
};

/// Trait for waitlist persistence
#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    /// Insert a new entry
    async fn insert(&self, entry: &WaitlistEntry) -> StoreResult<()>;

    /// Find an entry by ID
    async fn find(&self, id: WaitlistId) -> StoreResult<Option<WaitlistEntry>>;

    /// All entries in any of the given statuses, oldest first
    async fn list_by_status(&self, statuses: &[WaitlistStatus]) -> StoreResult<Vec<WaitlistEntry>>;

    /// Entries matching any of the criteria, in every status
    async fn search(&self, criteria: &SearchCriteria) -> StoreResult<Vec<WaitlistEntry>>;

    /// Overwrite an entry only if its stored status is still `expected`.
    ///
    /// Returns [`StoreError::Conflict`] when the entry is missing or its
    /// status has moved on.
    async fn compare_and_update(
        &self,
        entry: &WaitlistEntry,
        expected: WaitlistStatus,
    ) -> StoreResult<()>;

    /// Write derived queue fields. Entries that are no longer pending are
    /// left untouched.
    async fn update_queue_positions(&self, positions: &[QueuePosition]) -> StoreResult<()>;
}

/// Trait for table inventory persistence
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// All tables ordered by ID
    async fn list(&self) -> StoreResult<Vec<Table>>;

    /// Find a table by ID
    async fn find(&self, id: TableId) -> StoreResult<Option<Table>>;

    /// Insert or replace a table
    async fn upsert(&self, table: &Table) -> StoreResult<()>;

    /// Set a table's status. Returns false if the table does not exist.
    async fn update_status(&self, id: TableId, status: TableStatus) -> StoreResult<bool>;
}

const ENTRY_COLUMNS: &str = "id, name, email, phone, guest_count, preferred_date, time_slots,
    seating_preference, occasion, special_requests, dietary_notes, status, priority,
    position, estimated_wait_minutes, notification_expiry, notified_at, queued_at,
    created_at, updated_at";

fn corrupt(column: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{}: {}", column, err))
}

fn entry_from_row(row: &PgRow) -> StoreResult<WaitlistEntry> {
    let guest_count: i32 = row.try_get("guest_count")?;
    let slots: Vec<String> = row.try_get("time_slots")?;
    let time_slots = slots
        .iter()
        .map(|s| s.parse::<TimeSlot>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| corrupt("time_slots", e))?;
    let preference: String = row.try_get("seating_preference")?;
    let status: String = row.try_get("status")?;
    let priority: i16 = row.try_get("priority")?;
    let position: Option<i32> = row.try_get("position")?;
    let wait: Option<i32> = row.try_get("estimated_wait_minutes")?;

    Ok(WaitlistEntry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        guest_count: u32::try_from(guest_count).map_err(|e| corrupt("guest_count", e))?,
        preferred_date: row.try_get::<NaiveDate, _>("preferred_date")?,
        time_slots,
        seating_preference: preference
            .parse()
            .map_err(|e| corrupt("seating_preference", e))?,
        occasion: row.try_get("occasion")?,
        special_requests: row.try_get("special_requests")?,
        dietary_notes: row.try_get("dietary_notes")?,
        status: status.parse().map_err(|e| corrupt("status", e))?,
        priority: PriorityTier::from_rank(priority)
            .ok_or_else(|| corrupt("priority", priority))?,
        position: position
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt("position", e))?,
        estimated_wait_minutes: wait
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt("estimated_wait_minutes", e))?,
        notification_expiry: row.try_get::<Option<DateTime<Utc>>, _>("notification_expiry")?,
        notified_at: row.try_get::<Option<DateTime<Utc>>, _>("notified_at")?,
        queued_at: row.try_get("queued_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_i32(value: u32, column: &str) -> StoreResult<i32> {
    i32::try_from(value).map_err(|e| corrupt(column, e))
}

fn slot_strings(slots: &[TimeSlot]) -> Vec<String> {
    slots.iter().map(ToString::to_string).collect()
}

/// Writes the derived queue fields only. `updated_at` tracks status
/// transitions and is what the sweep and the turnover tracker read.
const UPDATE_QUEUE_POSITION: &str = "UPDATE waitlist_entries
     SET position = $2, estimated_wait_minutes = $3
     WHERE id = $1 AND status = 'pending'";

/// PostgreSQL implementation of `WaitlistRepository`
pub struct PgWaitlistRepository {
    pool: PgPool,
}

impl PgWaitlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistRepository for PgWaitlistRepository {
    async fn insert(&self, entry: &WaitlistEntry) -> StoreResult<()> {
        let query = sqlx::query(
            "INSERT INTO waitlist_entries (id, name, email, phone, guest_count, preferred_date,
                time_slots, seating_preference, occasion, special_requests, dietary_notes,
                status, priority, position, estimated_wait_minutes, notification_expiry,
                notified_at, queued_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20)",
        )
        .bind(entry.id)
        .bind(&entry.name)
        .bind(&entry.email)
        .bind(&entry.phone)
        .bind(to_i32(entry.guest_count, "guest_count")?)
        .bind(entry.preferred_date)
        .bind(slot_strings(&entry.time_slots))
        .bind(entry.seating_preference.to_string())
        .bind(&entry.occasion)
        .bind(&entry.special_requests)
        .bind(&entry.dietary_notes)
        .bind(entry.status.as_str())
        .bind(entry.priority.rank())
        .bind(entry.position.map(|p| to_i32(p, "position")).transpose()?)
        .bind(
            entry
                .estimated_wait_minutes
                .map(|w| to_i32(w, "estimated_wait_minutes"))
                .transpose()?,
        )
        .bind(entry.notification_expiry)
        .bind(entry.notified_at)
        .bind(entry.queued_at)
        .bind(entry.created_at)
        .bind(entry.updated_at);

        with_default_timeout(query.execute(&self.pool)).await?;
        Ok(())
    }

    async fn find(&self, id: WaitlistId) -> StoreResult<Option<WaitlistEntry>> {
        let sql = format!("SELECT {} FROM waitlist_entries WHERE id = $1", ENTRY_COLUMNS);
        let row = with_default_timeout(sqlx::query(&sql).bind(id).fetch_optional(&self.pool))
            .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_by_status(&self, statuses: &[WaitlistStatus]) -> StoreResult<Vec<WaitlistEntry>> {
        let statuses: Vec<&str> = statuses.iter().map(WaitlistStatus::as_str).collect();
        let sql = format!(
            "SELECT {} FROM waitlist_entries WHERE status = ANY($1)
             ORDER BY priority DESC, queued_at ASC, id ASC",
            ENTRY_COLUMNS
        );
        let rows =
            with_default_timeout(sqlx::query(&sql).bind(statuses).fetch_all(&self.pool)).await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn search(&self, criteria: &SearchCriteria) -> StoreResult<Vec<WaitlistEntry>> {
        let email = criteria
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let phone = criteria
            .phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty());

        let sql = format!(
            "SELECT {} FROM waitlist_entries
             WHERE id = $1 OR lower(email) = lower($2) OR phone = $3
             ORDER BY created_at ASC",
            ENTRY_COLUMNS
        );
        let rows = with_default_timeout(
            sqlx::query(&sql)
                .bind(criteria.id)
                .bind(email)
                .bind(phone)
                .fetch_all(&self.pool),
        )
        .await?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(entries.into_iter().filter(|e| criteria.matches(e)).collect())
    }

    async fn compare_and_update(
        &self,
        entry: &WaitlistEntry,
        expected: WaitlistStatus,
    ) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE waitlist_entries
             SET status = $3, priority = $4, position = $5, estimated_wait_minutes = $6,
                 notification_expiry = $7, notified_at = $8, queued_at = $9, updated_at = $10
             WHERE id = $1 AND status = $2",
        )
        .bind(entry.id)
        .bind(expected.as_str())
        .bind(entry.status.as_str())
        .bind(entry.priority.rank())
        .bind(entry.position.map(|p| to_i32(p, "position")).transpose()?)
        .bind(
            entry
                .estimated_wait_minutes
                .map(|w| to_i32(w, "estimated_wait_minutes"))
                .transpose()?,
        )
        .bind(entry.notification_expiry)
        .bind(entry.notified_at)
        .bind(entry.queued_at)
        .bind(entry.updated_at);

        let result = with_default_timeout(query.execute(&self.pool)).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(entry.id.to_string()));
        }
        Ok(())
    }

    async fn update_queue_positions(&self, positions: &[QueuePosition]) -> StoreResult<()> {
        let pool = self.pool.clone();
        let positions = positions.to_vec();

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async move {
            let mut tx = pool.begin().await?;
            for p in &positions {
                sqlx::query(UPDATE_QUEUE_POSITION)
                .bind(p.id)
                .bind(i32::try_from(p.position).unwrap_or(i32::MAX))
                .bind(i32::try_from(p.estimated_wait_minutes).unwrap_or(i32::MAX))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        })
        .await?;

        Ok(())
    }
}

fn table_from_row(row: &PgRow) -> StoreResult<Table> {
    let number: i32 = row.try_get("number")?;
    let capacity: i32 = row.try_get("capacity")?;
    let shape: String = row.try_get("shape")?;
    let location: String = row.try_get("location")?;
    let status: String = row.try_get("status")?;
    let features: Vec<String> = row.try_get("features")?;
    let x: Option<f64> = row.try_get("position_x")?;
    let y: Option<f64> = row.try_get("position_y")?;

    Ok(Table {
        id: row.try_get("id")?,
        number: u32::try_from(number).map_err(|e| corrupt("number", e))?,
        capacity: u32::try_from(capacity).map_err(|e| corrupt("capacity", e))?,
        shape: shape.parse().map_err(|e| corrupt("shape", e))?,
        location: location.parse().map_err(|e| corrupt("location", e))?,
        features: features.into_iter().collect::<BTreeSet<_>>(),
        status: status.parse().map_err(|e| corrupt("status", e))?,
        position: x.zip(y).map(|(x, y)| LayoutPosition { x, y }),
    })
}

/// PostgreSQL implementation of `TableRepository`
pub struct PgTableRepository {
    pool: PgPool,
}

impl PgTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableRepository for PgTableRepository {
    async fn list(&self) -> StoreResult<Vec<Table>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, number, capacity, shape, location, features, status,
                        position_x, position_y
                 FROM restaurant_tables ORDER BY id",
            )
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(table_from_row).collect()
    }

    async fn find(&self, id: TableId) -> StoreResult<Option<Table>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, number, capacity, shape, location, features, status,
                        position_x, position_y
                 FROM restaurant_tables WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(table_from_row).transpose()
    }

    async fn upsert(&self, table: &Table) -> StoreResult<()> {
        let features: Vec<&str> = table.features.iter().map(String::as_str).collect();
        let query = sqlx::query(
            "INSERT INTO restaurant_tables (id, number, capacity, shape, location, features,
                status, position_x, position_y)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                number = EXCLUDED.number, capacity = EXCLUDED.capacity,
                shape = EXCLUDED.shape, location = EXCLUDED.location,
                features = EXCLUDED.features, status = EXCLUDED.status,
                position_x = EXCLUDED.position_x, position_y = EXCLUDED.position_y,
                updated_at = NOW()",
        )
        .bind(table.id)
        .bind(to_i32(table.number, "number")?)
        .bind(to_i32(table.capacity, "capacity")?)
        .bind(table.shape.to_string())
        .bind(table.location.to_string())
        .bind(features)
        .bind(table.status.to_string())
        .bind(table.position.map(|p| p.x))
        .bind(table.position.map(|p| p.y));

        with_default_timeout(query.execute(&self.pool)).await?;
        Ok(())
    }

    async fn update_status(&self, id: TableId, status: TableStatus) -> StoreResult<bool> {
        let result = with_default_timeout(
            sqlx::query("UPDATE restaurant_tables SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status.to_string())
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
