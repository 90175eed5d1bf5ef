//! Common test utilities shared across integration tests.

use chrono::{DateTime, TimeZone, Utc};
use spotlight::testing::{ManualClock, RecordingStorage};
use spotlight::{InMemoryStorage, SlotConfig, SlotScheduler};
use std::sync::Arc;

/// Scheduler over recorded in-memory storage.
pub type TestScheduler = SlotScheduler<RecordingStorage<InMemoryStorage>>;

/// Midday UTC on the June solstice, when Berlin is at UTC+2.
pub fn summer_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 21, 12, 0, 0).unwrap()
}

/// Build a scheduler whose clock starts at `now`.
pub fn scheduler_at(now: DateTime<Utc>, config: SlotConfig) -> (TestScheduler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let scheduler = SlotScheduler::new(RecordingStorage::new(InMemoryStorage::new()), config)
        .with_clock(clock.clone());
    (scheduler, clock)
}

/// Item keys of a list of entries, in order.
pub fn keys(entries: &[spotlight::ScheduleEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.item_key.to_string())
        .collect()
}
