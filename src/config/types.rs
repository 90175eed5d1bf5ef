//! Configuration type definitions.
//!
//! This module contains the slot parameters and the global settings read
//! from `spotlight.yaml`.

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;
use crate::core::time::TimeNormalizer;

/// Shortest allowed promotion window, in hours.
pub const MIN_DURATION_HOURS: u32 = 1;

/// Longest allowed promotion window, in hours (one week).
pub const MAX_DURATION_HOURS: u32 = 168;

/// Window length used when a request omits one.
pub const DEFAULT_DURATION_HOURS: u32 = 24;

/// How long an ended slot is still reported as recently ended.
pub const DEFAULT_RECENT_ENDED_WINDOW_HOURS: u32 = 48;

const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 5;

/// Static parameters of the promotion scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Duration applied when the caller gives none or a non-numeric one.
    pub default_duration_hours: u32,
    /// Civil zone used to interpret local wall-clock input.
    pub timezone: Tz,
    /// Grace window during which ended slots count as recently ended.
    pub recent_ended_window_hours: u32,
    /// Optional cap on simultaneously active slots.
    pub max_concurrent_active: Option<usize>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: DEFAULT_DURATION_HOURS,
            timezone: chrono_tz::Europe::Berlin,
            recent_ended_window_hours: DEFAULT_RECENT_ENDED_WINDOW_HOURS,
            max_concurrent_active: None,
        }
    }
}

impl SlotConfig {
    /// Set the civil zone.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    /// Set the default duration.
    pub fn with_default_duration_hours(mut self, hours: u32) -> Self {
        self.default_duration_hours = hours;
        self
    }

    /// Set the recent-ended grace window.
    pub fn with_recent_ended_window_hours(mut self, hours: u32) -> Self {
        self.recent_ended_window_hours = hours;
        self
    }

    /// Cap the number of simultaneously active slots.
    pub fn with_max_concurrent_active(mut self, max: usize) -> Self {
        self.max_concurrent_active = Some(max);
        self
    }

    /// The recent-ended grace window as a time delta.
    pub fn recent_ended_window(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.recent_ended_window_hours))
    }

    /// A time normalizer for the configured civil zone.
    pub fn normalizer(&self) -> TimeNormalizer {
        TimeNormalizer::new(self.timezone)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&self.default_duration_hours) {
            return Err(ConfigError::InvalidConfig(format!(
                "default_duration_hours must be between {} and {}, got {}",
                MIN_DURATION_HOURS, MAX_DURATION_HOURS, self.default_duration_hours
            )));
        }
        if self.max_concurrent_active == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "max_concurrent_active cannot be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Global configuration (spotlight.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Slot parameters.
    pub slots: SlotConfig,
    /// Storage configuration. `None` leaves the scheduler unconfigured.
    pub storage: Option<StorageConfig>,
    /// Seconds to wait for the scheduling lock before giving up.
    pub lock_timeout_secs: u64,
    /// strftime pattern for human-readable output.
    pub display_format: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            slots: SlotConfig::default(),
            storage: None,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            display_format: None,
        }
    }
}

impl GlobalConfig {
    /// Lock timeout as a duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// A time normalizer honoring the configured zone and display format.
    pub fn normalizer(&self) -> TimeNormalizer {
        let normalizer = self.slots.normalizer();
        match &self.display_format {
            Some(format) => normalizer.with_display_format(format.clone()),
            None => normalizer,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// In-memory storage (non-persistent).
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// SQLite storage.
    #[serde(rename = "sqlite")]
    Sqlite {
        /// Path to the database file.
        path: String,
        /// How long to wait on a locked database, in milliseconds.
        busy_timeout_ms: Option<u64>,
    },
}
