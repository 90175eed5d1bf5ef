//! Testing utilities for users of the spotlight library.
//!
//! This module provides helpers for testing slot scheduling:
//!
//! - [`ManualClock`]: A clock that only moves when told to
//! - [`RecordingStorage`]: Wraps a backend and counts recompute and tick calls
//! - [`catalog`]: Builds a catalog snapshot from `(key, name)` pairs

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::catalog::CatalogEntry;
use crate::core::clock::Clock;
use crate::core::types::EntryId;
use crate::storage::{
    ComputedWindow, EntryStatus, LockedSession, NewEntry, RescheduleInput, ScheduleEntry, Storage,
    StorageError,
};

/// A clock frozen at a chosen instant.
///
/// # Example
///
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use spotlight::Clock;
/// use spotlight::testing::ManualClock;
///
/// let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap());
/// clock.advance(TimeDelta::hours(2));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2026, 6, 21, 14, 0, 0).unwrap());
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock reading `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    /// Move forward (or back, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut guard) = self.now.write() {
            *guard += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Storage wrapper that counts calls passing through its sessions.
pub struct RecordingStorage<S> {
    inner: S,
    recompute_calls: AtomicUsize,
    tick_calls: AtomicUsize,
}

impl<S: Storage> RecordingStorage<S> {
    /// Wrap a backend.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            recompute_calls: AtomicUsize::new(0),
            tick_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `update_computed_windows` calls so far.
    pub fn recompute_calls(&self) -> usize {
        self.recompute_calls.load(Ordering::SeqCst)
    }

    /// Number of `mark_completed_entries` calls so far.
    pub fn tick_calls(&self) -> usize {
        self.tick_calls.load(Ordering::SeqCst)
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Storage> Storage for RecordingStorage<S> {
    async fn locked_session<'a>(&'a self) -> Result<Box<dyn LockedSession + 'a>, StorageError> {
        let inner = self.inner.locked_session().await?;
        Ok(Box::new(RecordingSession {
            inner,
            recompute_calls: &self.recompute_calls,
            tick_calls: &self.tick_calls,
        }))
    }
}

struct RecordingSession<'a> {
    inner: Box<dyn LockedSession + 'a>,
    recompute_calls: &'a AtomicUsize,
    tick_calls: &'a AtomicUsize,
}

#[async_trait]
impl LockedSession for RecordingSession<'_> {
    async fn list_entries(
        &mut self,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, StorageError> {
        self.inner.list_entries(status).await
    }

    async fn create_entry(&mut self, input: NewEntry) -> Result<ScheduleEntry, StorageError> {
        self.inner.create_entry(input).await
    }

    async fn reschedule_entry(&mut self, input: RescheduleInput) -> Result<bool, StorageError> {
        self.inner.reschedule_entry(input).await
    }

    async fn cancel_entry(&mut self, id: &EntryId) -> Result<bool, StorageError> {
        self.inner.cancel_entry(id).await
    }

    async fn update_computed_windows(
        &mut self,
        windows: &[ComputedWindow],
    ) -> Result<(), StorageError> {
        self.recompute_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_computed_windows(windows).await
    }

    async fn clear_all_entries(&mut self) -> Result<u64, StorageError> {
        self.inner.clear_all_entries().await
    }

    async fn clear_scheduled_entries(&mut self) -> Result<u64, StorageError> {
        self.inner.clear_scheduled_entries().await
    }

    async fn clear_history_entries(&mut self) -> Result<u64, StorageError> {
        self.inner.clear_history_entries().await
    }

    async fn mark_completed_entries(&mut self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        self.tick_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_completed_entries(now).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let RecordingSession { inner, .. } = *self;
        inner.commit().await
    }
}

/// Build a catalog snapshot from `(key, name)` pairs.
pub fn catalog(pairs: &[(&str, &str)]) -> Vec<CatalogEntry> {
    pairs
        .iter()
        .map(|(key, name)| CatalogEntry::new(*key, *name))
        .collect()
}
