//! Pure slot rules: duration sanitizing, window computation, derived state
//! and projection partitioning.
//!
//! Nothing here touches storage or the clock; callers pass `now` in.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{MAX_DURATION_HOURS, MIN_DURATION_HOURS};
use crate::storage::{EffectiveWindow, EntryStatus, ScheduleEntry, sort_entries};

/// Presentation state of an entry at a given instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotState {
    /// Inside its window.
    Active,
    /// Window has not started yet.
    Upcoming,
    /// Window ended within the grace window.
    RecentEnded,
    /// Window ended long ago.
    Completed,
    /// Withdrawn by an administrator.
    Cancelled,
}

impl SlotState {
    /// Stable kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            SlotState::Active => "active",
            SlotState::Upcoming => "upcoming",
            SlotState::RecentEnded => "recent-ended",
            SlotState::Completed => "completed",
            SlotState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entries partitioned by their relation to an instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Scheduled entries whose window contains `now`.
    pub active: Vec<ScheduleEntry>,
    /// Scheduled entries whose window starts after `now`.
    pub upcoming: Vec<ScheduleEntry>,
    /// Entries of any status that ended no longer than the grace window ago.
    pub recent_ended: Vec<ScheduleEntry>,
}

/// Clamp a caller-supplied duration into `[1, 168]` hours.
///
/// Missing or non-finite input falls back to `default_hours`, which is
/// clamped too. Fractional hours round to the nearest whole hour.
pub fn sanitize_duration(input: Option<f64>, default_hours: u32) -> u32 {
    match input {
        Some(hours) if hours.is_finite() => {
            let clamped = hours
                .round()
                .clamp(f64::from(MIN_DURATION_HOURS), f64::from(MAX_DURATION_HOURS));
            clamped as u32
        }
        _ => default_hours.clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS),
    }
}

/// Effective window for a requested start and duration.
pub fn compute_window(requested_start_at: DateTime<Utc>, duration_hours: u32) -> EffectiveWindow {
    let hours = duration_hours.clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS);
    EffectiveWindow {
        start: requested_start_at,
        end: requested_start_at + TimeDelta::hours(i64::from(hours)),
    }
}

/// Classify an entry. First matching rule wins:
///
/// 1. cancelled status is `Cancelled`
/// 2. scheduled and `start <= now < end` is `Active`
/// 3. scheduled and `now < start` is `Upcoming`
/// 4. `now - end <= recent_window`, any status, is `RecentEnded`
/// 5. anything else is `Completed`
///
/// Rule 4 also covers scheduled entries whose end has passed but which the
/// completion tick has not reached yet.
pub fn derive_state(
    status: EntryStatus,
    window: EffectiveWindow,
    now: DateTime<Utc>,
    recent_window: TimeDelta,
) -> SlotState {
    if status == EntryStatus::Cancelled {
        return SlotState::Cancelled;
    }
    if status == EntryStatus::Scheduled {
        if window.contains(now) {
            return SlotState::Active;
        }
        if now < window.start {
            return SlotState::Upcoming;
        }
    }
    if now - window.end <= recent_window {
        return SlotState::RecentEnded;
    }
    SlotState::Completed
}

/// Derived state of a stored entry.
pub fn entry_state(entry: &ScheduleEntry, now: DateTime<Utc>, recent_window: TimeDelta) -> SlotState {
    derive_state(entry.status, entry.window(), now, recent_window)
}

/// Partition entries into active, upcoming and recently ended lists, each
/// ordered by effective start then id.
pub fn partition(
    entries: &[ScheduleEntry],
    now: DateTime<Utc>,
    recent_window: TimeDelta,
) -> Projection {
    let mut projection = Projection::default();

    for entry in entries {
        let window = entry.window();
        if entry.status == EntryStatus::Scheduled && window.contains(now) {
            projection.active.push(entry.clone());
        } else if entry.status == EntryStatus::Scheduled && window.start > now {
            projection.upcoming.push(entry.clone());
        }

        if window.end <= now && now - window.end <= recent_window {
            projection.recent_ended.push(entry.clone());
        }
    }

    sort_entries(&mut projection.active);
    sort_entries(&mut projection.upcoming);
    sort_entries(&mut projection.recent_ended);
    projection
}
