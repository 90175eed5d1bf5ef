//! SQLite storage implementation.
//!
//! Provides persistent storage using SQLite database.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::memory::DEFAULT_LOCK_TIMEOUT;
use super::{
    ComputedWindow, EntryStatus, LockedSession, NewEntry, RescheduleInput, ScheduleEntry, Storage,
    StorageError,
};
use crate::core::time::to_iso;
use crate::core::types::{EntryId, ItemKey};

/// Name of the singleton lock row.
const LOCK_NAME: &str = "promotion-slots";

const SELECT_COLUMNS: &str = "SELECT id, item_key, requested_start_at, effective_start_at, \
     effective_end_at, duration_hours, status, created_by, created_at, updated_at \
     FROM schedule_entries";

type EntryRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    String,
);

/// SQLite storage backend.
///
/// Each session is a transaction whose first statement writes the singleton
/// `scheduler_lock` row, so sessions are serialized across every process
/// sharing the database file. An in-process mutex sits in front of it.
pub struct SqliteStorage {
    pool: SqlitePool,
    session_lock: Mutex<()>,
    lock_timeout: Duration,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(path, DEFAULT_LOCK_TIMEOUT).await
    }

    /// Open a database, bounding lock waits by `lock_timeout`.
    pub async fn open(path: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self, StorageError> {
        Self::open_with_busy_timeout(path, lock_timeout, lock_timeout).await
    }

    /// Open a database with separate in-process and database lock waits.
    pub async fn open_with_busy_timeout(
        path: impl AsRef<Path>,
        lock_timeout: Duration,
        busy_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StorageError::Other(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self {
            pool,
            session_lock: Mutex::new(()),
            lock_timeout,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (useful for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self {
            pool,
            session_lock: Mutex::new(()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let schema = include_str!("../../migrations/001_initial_schema.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("invalid timestamp {:?}: {}", s, e)))
}

fn row_to_entry(row: EntryRow) -> Result<ScheduleEntry, StorageError> {
    let duration_hours = u32::try_from(row.5).map_err(|_| {
        StorageError::SerializationError(format!("invalid duration_hours: {}", row.5))
    })?;

    Ok(ScheduleEntry {
        id: row
            .0
            .parse()
            .map_err(|e| StorageError::SerializationError(format!("invalid uuid: {}", e)))?,
        item_key: ItemKey::new(row.1),
        requested_start_at: parse_time(&row.2)?,
        effective_start_at: parse_time(&row.3)?,
        effective_end_at: parse_time(&row.4)?,
        duration_hours,
        status: row.6.parse()?,
        created_by: row.7,
        created_at: parse_time(&row.8)?,
        updated_at: parse_time(&row.9)?,
    })
}

fn query_error(e: sqlx::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn locked_session<'a>(&'a self) -> Result<Box<dyn LockedSession + 'a>, StorageError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.session_lock.lock())
            .await
            .map_err(|_| {
                StorageError::LockUnavailable(format!(
                    "timed out after {:?} waiting for another session",
                    self.lock_timeout
                ))
            })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::LockUnavailable(e.to_string()))?;

        // Takes the database write lock; blocks at most busy_timeout.
        sqlx::query("UPDATE scheduler_lock SET held_since = ? WHERE name = ?")
            .bind(to_iso(Utc::now()))
            .bind(LOCK_NAME)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::LockUnavailable(e.to_string()))?;

        Ok(Box::new(SqliteSession { _guard: guard, tx }))
    }
}

struct SqliteSession<'a> {
    _guard: MutexGuard<'a, ()>,
    tx: Transaction<'static, Sqlite>,
}

impl SqliteSession<'_> {
    async fn delete_where(&mut self, clause: &str) -> Result<u64, StorageError> {
        let result = sqlx::query(&format!("DELETE FROM schedule_entries{}", clause))
            .execute(&mut *self.tx)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LockedSession for SqliteSession<'_> {
    async fn list_entries(
        &mut self,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, StorageError> {
        let rows: Vec<EntryRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "{} WHERE status = ? ORDER BY effective_start_at, id",
                    SELECT_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&mut *self.tx)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "{} ORDER BY effective_start_at, id",
                    SELECT_COLUMNS
                ))
                .fetch_all(&mut *self.tx)
                .await
            }
        }
        .map_err(query_error)?;

        rows.into_iter().map(row_to_entry).collect()
    }

    async fn create_entry(&mut self, input: NewEntry) -> Result<ScheduleEntry, StorageError> {
        let entry = ScheduleEntry::from_new(input, Utc::now().trunc_subsecs(3));

        sqlx::query(
            r#"
            INSERT INTO schedule_entries (
                id, item_key, requested_start_at, effective_start_at, effective_end_at,
                duration_hours, status, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.item_key.as_str())
        .bind(to_iso(entry.requested_start_at))
        .bind(to_iso(entry.effective_start_at))
        .bind(to_iso(entry.effective_end_at))
        .bind(i64::from(entry.duration_hours))
        .bind(entry.status.as_str())
        .bind(&entry.created_by)
        .bind(to_iso(entry.created_at))
        .bind(to_iso(entry.updated_at))
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(entry)
    }

    async fn reschedule_entry(&mut self, input: RescheduleInput) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE schedule_entries
            SET requested_start_at = ?, duration_hours = ?, effective_start_at = ?,
                effective_end_at = ?, updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(to_iso(input.requested_start_at))
        .bind(i64::from(input.duration_hours))
        .bind(to_iso(input.window.start))
        .bind(to_iso(input.window.end))
        .bind(to_iso(Utc::now()))
        .bind(input.id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_entry(&mut self, id: &EntryId) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE schedule_entries SET status = 'cancelled', updated_at = ? \
             WHERE id = ? AND status = 'scheduled'",
        )
        .bind(to_iso(Utc::now()))
        .bind(id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_computed_windows(
        &mut self,
        windows: &[ComputedWindow],
    ) -> Result<(), StorageError> {
        let now = to_iso(Utc::now());
        for computed in windows {
            sqlx::query(
                "UPDATE schedule_entries SET effective_start_at = ?1, effective_end_at = ?2, \
                 updated_at = ?3 WHERE id = ?4 AND status = 'scheduled' \
                 AND (effective_start_at != ?1 OR effective_end_at != ?2)",
            )
            .bind(to_iso(computed.window.start))
            .bind(to_iso(computed.window.end))
            .bind(&now)
            .bind(computed.id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(query_error)?;
        }
        Ok(())
    }

    async fn clear_all_entries(&mut self) -> Result<u64, StorageError> {
        self.delete_where("").await
    }

    async fn clear_scheduled_entries(&mut self) -> Result<u64, StorageError> {
        self.delete_where(" WHERE status = 'scheduled'").await
    }

    async fn clear_history_entries(&mut self) -> Result<u64, StorageError> {
        self.delete_where(" WHERE status IN ('cancelled', 'completed')")
            .await
    }

    async fn mark_completed_entries(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE schedule_entries SET status = 'completed', updated_at = ? \
             WHERE status = 'scheduled' AND effective_end_at <= ?",
        )
        .bind(to_iso(Utc::now()))
        .bind(to_iso(now))
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let SqliteSession { _guard, tx } = *self;
        tx.commit().await.map_err(query_error)
    }
}
