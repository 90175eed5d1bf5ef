//! Scheduling engine for promotion slots.
//!
//! This module provides the operations administrators run against the slot
//! queue, and the read-side views derived from it.

mod engine;
pub mod rules;
mod types;

pub use engine::SlotScheduler;
pub use rules::{Projection, SlotState};
pub use types::{QueueItem, QueueView, SchedulerError};
