//! Configuration loading and parsing.
//!
//! This module provides the slot parameters and YAML-based global settings
//! (`spotlight.yaml`).

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{
    DEFAULT_DURATION_HOURS, DEFAULT_RECENT_ENDED_WINDOW_HOURS, GlobalConfig, MAX_DURATION_HOURS,
    MIN_DURATION_HOURS, SlotConfig, StorageConfig,
};
pub use yaml::YamlLoader;
