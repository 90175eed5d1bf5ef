//! Mutation events and event handling.
//!
//! The scheduler emits an event after every committed change to the entry
//! table, giving callers a hook to refresh cached read surfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::types::{EntryId, ItemKey};

/// Which partition of the entry table a clear removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    /// Every entry.
    All,
    /// Only `scheduled` entries.
    Queue,
    /// Only terminal entries.
    History,
}

/// Events emitted after a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new entry was created.
    EntryScheduled {
        entry_id: EntryId,
        item_key: ItemKey,
        timestamp: DateTime<Utc>,
    },

    /// An entry received new start/duration inputs.
    EntryRescheduled {
        entry_id: EntryId,
        timestamp: DateTime<Utc>,
    },

    /// An entry was cancelled.
    EntryCancelled {
        entry_id: EntryId,
        timestamp: DateTime<Utc>,
    },

    /// Entries were deleted in bulk.
    EntriesCleared {
        scope: ClearScope,
        removed: u64,
        timestamp: DateTime<Utc>,
    },

    /// The completion tick moved entries to `completed`.
    EntriesCompleted {
        count: u64,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::EntryScheduled { timestamp, .. }
            | Event::EntryRescheduled { timestamp, .. }
            | Event::EntryCancelled { timestamp, .. }
            | Event::EntriesCleared { timestamp, .. }
            | Event::EntriesCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Create an EntryScheduled event.
    pub fn entry_scheduled(entry_id: EntryId, item_key: ItemKey, timestamp: DateTime<Utc>) -> Self {
        Event::EntryScheduled {
            entry_id,
            item_key,
            timestamp,
        }
    }

    /// Create an EntryRescheduled event.
    pub fn entry_rescheduled(entry_id: EntryId, timestamp: DateTime<Utc>) -> Self {
        Event::EntryRescheduled {
            entry_id,
            timestamp,
        }
    }

    /// Create an EntryCancelled event.
    pub fn entry_cancelled(entry_id: EntryId, timestamp: DateTime<Utc>) -> Self {
        Event::EntryCancelled {
            entry_id,
            timestamp,
        }
    }

    /// Create an EntriesCleared event.
    pub fn entries_cleared(scope: ClearScope, removed: u64, timestamp: DateTime<Utc>) -> Self {
        Event::EntriesCleared {
            scope,
            removed,
            timestamp,
        }
    }

    /// Create an EntriesCompleted event.
    pub fn entries_completed(count: u64, timestamp: DateTime<Utc>) -> Self {
        Event::EntriesCompleted { count, timestamp }
    }
}

/// Handler for receiving mutation events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers, in registration order.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler that writes every event to the `tracing` log.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::EntryScheduled {
                entry_id, item_key, ..
            } => {
                tracing::info!(entry_id = %entry_id, item_key = %item_key, "Slot scheduled");
            }
            Event::EntryRescheduled { entry_id, .. } => {
                tracing::info!(entry_id = %entry_id, "Slot rescheduled");
            }
            Event::EntryCancelled { entry_id, .. } => {
                tracing::info!(entry_id = %entry_id, "Slot cancelled");
            }
            Event::EntriesCleared { scope, removed, .. } => {
                tracing::info!(scope = ?scope, removed, "Slots cleared");
            }
            Event::EntriesCompleted { count, .. } => {
                tracing::debug!(count, "Slots completed");
            }
        }
    }
}
