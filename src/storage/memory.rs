//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::{
    ComputedWindow, EntryStatus, LockedSession, NewEntry, RescheduleInput, ScheduleEntry, Storage,
    StorageError, sort_entries,
};
use crate::core::types::EntryId;

/// Default time to wait for the scheduling lock.
pub(crate) const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory storage backend.
///
/// A single async mutex serializes sessions. Each session works on a copy of
/// the table that replaces the shared one on commit. Data is not persisted
/// across restarts.
pub struct InMemoryStorage {
    session_lock: Mutex<()>,
    entries: RwLock<HashMap<EntryId, ScheduleEntry>>,
    lock_timeout: Duration,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            session_lock: Mutex::new(()),
            entries: RwLock::new(HashMap::new()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set how long a session request waits for the lock before failing.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn locked_session<'a>(&'a self) -> Result<Box<dyn LockedSession + 'a>, StorageError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.session_lock.lock())
            .await
            .map_err(|_| {
                StorageError::LockUnavailable(format!(
                    "timed out after {:?} waiting for another session",
                    self.lock_timeout
                ))
            })?;

        let working = self
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned)?
            .clone();

        Ok(Box::new(InMemorySession {
            _guard: guard,
            committed: &self.entries,
            working,
        }))
    }
}

struct InMemorySession<'a> {
    _guard: MutexGuard<'a, ()>,
    committed: &'a RwLock<HashMap<EntryId, ScheduleEntry>>,
    working: HashMap<EntryId, ScheduleEntry>,
}

impl InMemorySession<'_> {
    fn scheduled_mut(&mut self, id: &EntryId) -> Option<&mut ScheduleEntry> {
        self.working
            .get_mut(id)
            .filter(|entry| entry.status == EntryStatus::Scheduled)
    }

    fn remove_where(&mut self, predicate: impl Fn(&ScheduleEntry) -> bool) -> u64 {
        let before = self.working.len();
        self.working.retain(|_, entry| !predicate(entry));
        (before - self.working.len()) as u64
    }
}

#[async_trait]
impl LockedSession for InMemorySession<'_> {
    async fn list_entries(
        &mut self,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, StorageError> {
        let mut result: Vec<_> = self
            .working
            .values()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .cloned()
            .collect();
        sort_entries(&mut result);
        Ok(result)
    }

    async fn create_entry(&mut self, input: NewEntry) -> Result<ScheduleEntry, StorageError> {
        let entry = ScheduleEntry::from_new(input, Utc::now());
        self.working.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn reschedule_entry(&mut self, input: RescheduleInput) -> Result<bool, StorageError> {
        let Some(entry) = self.scheduled_mut(&input.id) else {
            return Ok(false);
        };
        entry.requested_start_at = input.requested_start_at;
        entry.duration_hours = input.duration_hours;
        entry.effective_start_at = input.window.start;
        entry.effective_end_at = input.window.end;
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn cancel_entry(&mut self, id: &EntryId) -> Result<bool, StorageError> {
        let Some(entry) = self.scheduled_mut(id) else {
            return Ok(false);
        };
        entry.status = EntryStatus::Cancelled;
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_computed_windows(
        &mut self,
        windows: &[ComputedWindow],
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        for computed in windows {
            if let Some(entry) = self.scheduled_mut(&computed.id)
                && entry.window() != computed.window
            {
                entry.effective_start_at = computed.window.start;
                entry.effective_end_at = computed.window.end;
                entry.updated_at = now;
            }
        }
        Ok(())
    }

    async fn clear_all_entries(&mut self) -> Result<u64, StorageError> {
        Ok(self.remove_where(|_| true))
    }

    async fn clear_scheduled_entries(&mut self) -> Result<u64, StorageError> {
        Ok(self.remove_where(|entry| entry.status == EntryStatus::Scheduled))
    }

    async fn clear_history_entries(&mut self) -> Result<u64, StorageError> {
        Ok(self.remove_where(|entry| entry.status.is_terminal()))
    }

    async fn mark_completed_entries(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let stamp = Utc::now();
        let mut count = 0;
        for entry in self.working.values_mut() {
            if entry.status == EntryStatus::Scheduled && entry.effective_end_at <= now {
                entry.status = EntryStatus::Completed;
                entry.updated_at = stamp;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemorySession {
            _guard,
            committed,
            working,
        } = *self;
        let mut entries = committed.write().map_err(|_| StorageError::LockPoisoned)?;
        *entries = working;
        Ok(())
    }
}
