//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Creating, rescheduling and cancelling promotion slots
//! - Bulk clearing of the queue and the history
//! - Recomputing effective windows after every structural change
//! - Completing ended slots lazily on every read
//! - Event emission after committed changes
//!
//! Every operation runs inside one locked storage session, so no two
//! operations interleave anywhere in the system.

use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;

use super::rules::{self, Projection, SlotState};
use super::types::{QueueItem, QueueView, SchedulerError};
use crate::catalog::{self, CatalogItem, PromotedItem};
use crate::config::SlotConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::time::TimeNormalizer;
use crate::core::types::{EntryId, ItemKey};
use crate::events::{ClearScope, Event, EventBus};
use crate::storage::{
    ComputedWindow, EntryStatus, LockedSession, NewEntry, RescheduleInput, ScheduleEntry, Storage,
    StorageError,
};

type Session<'a> = Box<dyn LockedSession + 'a>;

/// The promotion slot scheduler.
pub struct SlotScheduler<S: Storage + ?Sized> {
    /// Storage backend.
    storage: Arc<S>,
    /// Slot parameters.
    config: SlotConfig,
    /// Interprets start-time input in the configured zone.
    normalizer: TimeNormalizer,
    /// Source of "now".
    clock: Arc<dyn Clock>,
    /// Event bus for emitting events.
    event_bus: Arc<EventBus>,
}

impl<S: Storage> SlotScheduler<S> {
    /// Create a new scheduler with the given storage.
    pub fn new(storage: S, config: SlotConfig) -> Self {
        Self::with_storage(Arc::new(storage), config)
    }
}

impl<S: Storage + ?Sized> SlotScheduler<S> {
    /// Create a new scheduler with shared storage.
    pub fn with_storage(storage: Arc<S>, config: SlotConfig) -> Self {
        Self {
            storage,
            normalizer: config.normalizer(),
            config,
            clock: Arc::new(SystemClock),
            event_bus: Arc::new(EventBus::new()),
        }
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Get the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Get the slot configuration.
    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Get the time normalizer for the configured zone.
    pub fn normalizer(&self) -> &TimeNormalizer {
        &self.normalizer
    }

    /// Create a slot for `item_key`.
    ///
    /// A missing or blank start means "now". The duration is clamped into
    /// `[1, 168]` hours, and falls back to the configured default when
    /// missing or not finite.
    pub async fn schedule(
        &self,
        item_key: impl Into<ItemKey>,
        requested_start_at: Option<&str>,
        duration_hours: Option<f64>,
        created_by: &str,
    ) -> Result<ScheduleEntry, SchedulerError> {
        let item_key = item_key.into();
        let requested = match requested_start_at.map(str::trim) {
            Some(input) if !input.is_empty() => Some(self.normalizer.parse(input)?),
            _ => None,
        };
        let duration_hours =
            rules::sanitize_duration(duration_hours, self.config.default_duration_hours);

        let mut session = self.storage.locked_session().await?;

        // Read under the lock so the capacity check sees every committed slot.
        let now = self.clock.now().trunc_subsecs(3);
        let start = requested.unwrap_or(now);
        let window = rules::compute_window(start, duration_hours);

        if let Some(max) = self.config.max_concurrent_active
            && window.contains(now)
        {
            let active = session
                .list_entries(Some(EntryStatus::Scheduled))
                .await?
                .iter()
                .filter(|entry| entry.window().contains(now))
                .count();
            if active >= max {
                tracing::warn!(item_key = %item_key, active, max, "Refusing slot over active limit");
                return Err(SchedulerError::CapacityExceeded { active, max });
            }
        }

        let entry = session
            .create_entry(NewEntry {
                item_key,
                requested_start_at: start,
                duration_hours,
                window,
                created_by: created_by.to_string(),
            })
            .await?;
        Self::recompute_windows(&mut session).await?;
        session.commit().await?;

        tracing::info!(
            entry_id = %entry.id,
            item_key = %entry.item_key,
            start = %entry.effective_start_at,
            duration_hours,
            "Scheduled promotion slot"
        );
        self.event_bus
            .emit(Event::entry_scheduled(
                entry.id.clone(),
                entry.item_key.clone(),
                now,
            ))
            .await;

        Ok(entry)
    }

    /// Cancel a slot.
    ///
    /// Returns `false` if the entry does not exist or is already terminal.
    pub async fn cancel(&self, id: &EntryId) -> Result<bool, SchedulerError> {
        let mut session = self.storage.locked_session().await?;
        let changed = session.cancel_entry(id).await?;
        if changed {
            Self::recompute_windows(&mut session).await?;
        }
        session.commit().await?;

        if changed {
            tracing::info!(entry_id = %id, "Cancelled promotion slot");
            self.event_bus
                .emit(Event::entry_cancelled(id.clone(), self.clock.now()))
                .await;
        } else {
            tracing::debug!(entry_id = %id, "Cancel had no effect");
        }
        Ok(changed)
    }

    /// Move a slot to a new start and duration.
    ///
    /// Inputs are normalized as in [`schedule`](Self::schedule). Returns
    /// `false` if the entry does not exist or is already terminal.
    pub async fn reschedule(
        &self,
        id: &EntryId,
        requested_start_at: &str,
        duration_hours: Option<f64>,
    ) -> Result<bool, SchedulerError> {
        let start = self.normalizer.parse(requested_start_at)?;
        let duration_hours =
            rules::sanitize_duration(duration_hours, self.config.default_duration_hours);

        let mut session = self.storage.locked_session().await?;
        let updated = session
            .reschedule_entry(RescheduleInput {
                id: id.clone(),
                requested_start_at: start,
                duration_hours,
                window: rules::compute_window(start, duration_hours),
            })
            .await?;
        if updated {
            Self::recompute_windows(&mut session).await?;
        }
        session.commit().await?;

        if updated {
            tracing::info!(entry_id = %id, start = %start, duration_hours, "Rescheduled promotion slot");
            self.event_bus
                .emit(Event::entry_rescheduled(id.clone(), self.clock.now()))
                .await;
        }
        Ok(updated)
    }

    /// Delete every entry. Returns the number removed.
    pub async fn clear_queue_and_history(&self) -> Result<u64, SchedulerError> {
        self.clear(ClearScope::All).await
    }

    /// Delete scheduled entries. Returns the number removed.
    pub async fn clear_queue_only(&self) -> Result<u64, SchedulerError> {
        self.clear(ClearScope::Queue).await
    }

    /// Delete cancelled and completed entries. Returns the number removed.
    pub async fn clear_history_only(&self) -> Result<u64, SchedulerError> {
        self.clear(ClearScope::History).await
    }

    /// Delete one partition of the entry table. Returns the number removed.
    pub async fn clear(&self, scope: ClearScope) -> Result<u64, SchedulerError> {
        let mut session = self.storage.locked_session().await?;
        let removed = match scope {
            ClearScope::All => session.clear_all_entries().await?,
            ClearScope::Queue => {
                let removed = session.clear_scheduled_entries().await?;
                Self::recompute_windows(&mut session).await?;
                removed
            }
            ClearScope::History => session.clear_history_entries().await?,
        };
        session.commit().await?;

        tracing::info!(scope = ?scope, removed, "Cleared promotion slots");
        self.event_bus
            .emit(Event::entries_cleared(scope, removed, self.clock.now()))
            .await;
        Ok(removed)
    }

    /// List entries, optionally filtered by status.
    ///
    /// Ended slots are completed first.
    pub async fn list(
        &self,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, SchedulerError> {
        self.read_at(self.clock.now(), status).await
    }

    /// Partition entries relative to the current instant.
    pub async fn projection(&self) -> Result<Projection, SchedulerError> {
        self.projection_at(self.clock.now()).await
    }

    /// Partition entries relative to `now`.
    ///
    /// The completion tick never runs past the clock, so a future `now`
    /// previews the partition without completing slots early.
    pub async fn projection_at(&self, now: DateTime<Utc>) -> Result<Projection, SchedulerError> {
        let entries = self.read_at(now.min(self.clock.now()), None).await?;
        Ok(rules::partition(
            &entries,
            now,
            self.config.recent_ended_window(),
        ))
    }

    /// Build the admin queue: every entry with its display name and state.
    pub async fn build_queue_view<T: CatalogItem>(
        &self,
        items: &[T],
    ) -> Result<QueueView, SchedulerError> {
        let now = self.clock.now();
        let entries = self.read_at(now, None).await?;
        let names = catalog::name_lookup(items);
        let recent_window = self.config.recent_ended_window();

        let items_out: Vec<QueueItem> = entries
            .into_iter()
            .map(|entry| QueueItem {
                display_name: catalog::resolve_name(&names, &entry.item_key),
                state: rules::entry_state(&entry, now, recent_window),
                entry,
            })
            .collect();
        let active_count = items_out
            .iter()
            .filter(|item| item.state == SlotState::Active)
            .count();

        Ok(QueueView {
            items: items_out,
            active_count,
            config: self.config.clone(),
            options: catalog::selection_options(items),
        })
    }

    /// Stamp catalog items with their current promotion state.
    pub async fn apply_projection_to_items<T: CatalogItem>(
        &self,
        items: Vec<T>,
    ) -> Result<Vec<PromotedItem<T>>, SchedulerError> {
        let projection = self.projection().await?;
        Ok(catalog::apply_active_entries(items, &projection.active))
    }

    /// Run the completion tick and read entries under the lock.
    ///
    /// An unconfigured store reads as empty.
    async fn read_at(
        &self,
        now: DateTime<Utc>,
        status: Option<EntryStatus>,
    ) -> Result<Vec<ScheduleEntry>, SchedulerError> {
        let mut session = match self.storage.locked_session().await {
            Ok(session) => session,
            Err(StorageError::NotConfigured(reason)) => {
                tracing::warn!(reason = %reason, "Schedule store not configured, returning no entries");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let completed = session.mark_completed_entries(now).await?;
        let entries = session.list_entries(status).await?;
        session.commit().await?;

        if completed > 0 {
            tracing::debug!(count = completed, "Completed ended promotion slots");
            self.event_bus
                .emit(Event::entries_completed(completed, now))
                .await;
        }
        Ok(entries)
    }

    /// Re-derive and persist the window of every scheduled entry.
    async fn recompute_windows(session: &mut Session<'_>) -> Result<(), StorageError> {
        let windows: Vec<ComputedWindow> = session
            .list_entries(Some(EntryStatus::Scheduled))
            .await?
            .into_iter()
            .map(|entry| ComputedWindow {
                window: rules::compute_window(entry.requested_start_at, entry.duration_hours),
                id: entry.id,
            })
            .collect();
        session.update_computed_windows(&windows).await?;
        tracing::debug!(count = windows.len(), "Recomputed effective windows");
        Ok(())
    }
}
