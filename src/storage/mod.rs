//! Storage abstraction for persisting schedule entries.
//!
//! All access goes through a [`LockedSession`]: an exclusive, transactional
//! view of the entry table. Only one session exists system-wide at a time,
//! and writes made through a session become visible only when it is
//! committed. Dropping a session without committing discards its writes.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod unconfigured;

pub use memory::InMemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use unconfigured::UnconfiguredStorage;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{GlobalConfig, StorageConfig};
use crate::core::types::{EntryId, ItemKey};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No backing store has been configured.
    #[error("schedule store is not configured: {0}")]
    NotConfigured(String),

    /// The global scheduling lock could not be acquired.
    #[error("could not acquire scheduling lock: {0}")]
    LockUnavailable(String),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// Lifecycle status of a schedule entry.
///
/// `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Waiting for or inside its promotion window.
    Scheduled,
    /// Withdrawn by an administrator.
    Cancelled,
    /// Window has ended and the completion tick has run.
    Completed,
}

impl EntryStatus {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EntryStatus::Scheduled)
    }

    /// Stable lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Scheduled => "scheduled",
            EntryStatus::Cancelled => "cancelled",
            EntryStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(EntryStatus::Scheduled),
            "cancelled" => Ok(EntryStatus::Cancelled),
            "completed" => Ok(EntryStatus::Completed),
            other => Err(StorageError::SerializationError(format!(
                "unknown entry status: {}",
                other
            ))),
        }
    }
}

/// The `[start, end)` interval during which an item is promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl EffectiveWindow {
    /// Length of the window.
    pub fn length(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Whether `now` falls inside `[start, end)`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

/// A persisted promotion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// The catalog item being promoted.
    pub item_key: ItemKey,
    /// Start instant as requested, after normalization.
    pub requested_start_at: DateTime<Utc>,
    /// Start of the effective promotion window.
    pub effective_start_at: DateTime<Utc>,
    /// End of the effective promotion window (exclusive).
    pub effective_end_at: DateTime<Utc>,
    /// Window length in hours, within `[1, 168]`.
    pub duration_hours: u32,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Who requested the slot.
    pub created_by: String,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Build a fresh `Scheduled` entry from creation input.
    pub fn from_new(input: NewEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            item_key: input.item_key,
            requested_start_at: input.requested_start_at,
            effective_start_at: input.window.start,
            effective_end_at: input.window.end,
            duration_hours: input.duration_hours,
            status: EntryStatus::Scheduled,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stored effective window.
    pub fn window(&self) -> EffectiveWindow {
        EffectiveWindow {
            start: self.effective_start_at,
            end: self.effective_end_at,
        }
    }
}

/// Input for creating an entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// The catalog item being promoted.
    pub item_key: ItemKey,
    /// Normalized requested start.
    pub requested_start_at: DateTime<Utc>,
    /// Sanitized duration.
    pub duration_hours: u32,
    /// Initial effective window.
    pub window: EffectiveWindow,
    /// Who requested the slot.
    pub created_by: String,
}

/// Input for rescheduling an existing entry.
#[derive(Debug, Clone)]
pub struct RescheduleInput {
    /// Entry to update.
    pub id: EntryId,
    /// Normalized requested start.
    pub requested_start_at: DateTime<Utc>,
    /// Sanitized duration.
    pub duration_hours: u32,
    /// Effective window derived from the new inputs.
    pub window: EffectiveWindow,
}

/// A recomputed window for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedWindow {
    /// Entry the window belongs to.
    pub id: EntryId,
    /// The new effective window.
    pub window: EffectiveWindow,
}

/// Orders entries by effective start, then id.
pub(crate) fn sort_entries(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| {
        a.effective_start_at
            .cmp(&b.effective_start_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Storage backend offering exclusive sessions over the entry table.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Acquire the global scheduling lock and open a transactional session.
    ///
    /// Fails with [`StorageError::LockUnavailable`] rather than waiting
    /// indefinitely, and with [`StorageError::NotConfigured`] when there is no
    /// backing store.
    async fn locked_session<'a>(&'a self) -> Result<Box<dyn LockedSession + 'a>, StorageError>;
}

/// Exclusive access to the entry table for the duration of one operation.
#[async_trait]
pub trait LockedSession: Send {
    /// List entries ordered by effective start then id, optionally filtered.
    async fn list_entries(
        &mut self,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, StorageError>;

    /// Insert a new `Scheduled` entry and return it as persisted.
    async fn create_entry(&mut self, input: NewEntry) -> Result<ScheduleEntry, StorageError>;

    /// Apply new inputs to a non-terminal entry.
    ///
    /// Returns `false` if the entry is missing or terminal.
    async fn reschedule_entry(&mut self, input: RescheduleInput) -> Result<bool, StorageError>;

    /// Mark a non-terminal entry cancelled.
    ///
    /// Returns `false` if the entry is missing or terminal.
    async fn cancel_entry(&mut self, id: &EntryId) -> Result<bool, StorageError>;

    /// Persist recomputed windows for `Scheduled` entries.
    ///
    /// Windows for ids that are missing or terminal are ignored. Entries
    /// whose window is unchanged keep their `updated_at`.
    async fn update_computed_windows(
        &mut self,
        windows: &[ComputedWindow],
    ) -> Result<(), StorageError>;

    /// Delete every entry. Returns the number removed.
    async fn clear_all_entries(&mut self) -> Result<u64, StorageError>;

    /// Delete `Scheduled` entries. Returns the number removed.
    async fn clear_scheduled_entries(&mut self) -> Result<u64, StorageError>;

    /// Delete terminal entries. Returns the number removed.
    async fn clear_history_entries(&mut self) -> Result<u64, StorageError>;

    /// Transition `Scheduled` entries with `effective_end_at <= now` to
    /// `Completed`. Returns the number transitioned.
    async fn mark_completed_entries(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError>;

    /// Make all writes visible and release the lock.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Open the backend named by the configuration.
///
/// A missing `storage` section yields [`UnconfiguredStorage`].
pub async fn open_storage(config: &GlobalConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let lock_timeout = config.lock_timeout();
    match &config.storage {
        None => {
            tracing::warn!("No storage configured; scheduling operations will be refused");
            Ok(Arc::new(UnconfiguredStorage::new()))
        }
        Some(StorageConfig::Memory) => {
            Ok(Arc::new(InMemoryStorage::new().with_lock_timeout(lock_timeout)))
        }
        #[cfg(feature = "sqlite")]
        Some(StorageConfig::Sqlite {
            path,
            busy_timeout_ms,
        }) => {
            let busy_timeout = busy_timeout_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(lock_timeout);
            tracing::info!(path = %path, "Opening SQLite schedule store");
            let storage =
                SqliteStorage::open_with_busy_timeout(path, lock_timeout, busy_timeout).await?;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(StorageConfig::Sqlite { .. }) => Err(StorageError::NotConfigured(
            "sqlite storage requested but the `sqlite` feature is disabled".to_string(),
        )),
    }
}
