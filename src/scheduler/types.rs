//! Scheduler type definitions.
//!
//! This module contains the error type and the presentation views returned
//! by the scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rules::SlotState;
use crate::catalog::CatalogEntry;
use crate::config::SlotConfig;
use crate::core::time::TimeError;
use crate::storage::{ScheduleEntry, StorageError};

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A start time could not be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TimeError),

    /// The global scheduling lock could not be acquired.
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),

    /// No backing store is configured.
    #[error("scheduler is not configured: {0}")]
    NotConfigured(String),

    /// Creating the entry would exceed the active-slot cap.
    #[error("active slot limit reached ({active} of {max})")]
    CapacityExceeded { active: usize, max: usize },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for SchedulerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured(msg) => SchedulerError::NotConfigured(msg),
            StorageError::LockUnavailable(msg) => SchedulerError::Unavailable(msg),
            other => SchedulerError::Storage(other),
        }
    }
}

/// An entry prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub entry: ScheduleEntry,
    /// Catalog name, or the item key when the catalog does not know it.
    pub display_name: String,
    pub state: SlotState,
}

/// Everything the admin queue screen needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueView {
    pub items: Vec<QueueItem>,
    /// Number of items currently in the `active` state.
    pub active_count: usize,
    pub config: SlotConfig,
    /// Catalog items for the picker, sorted by name.
    pub options: Vec<CatalogEntry>,
}
