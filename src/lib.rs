//! Time-boxed promotion slots for catalog items.
//!
//! An administrator asks for an item to be promoted from a wall-clock start
//! for some number of hours. [`SlotScheduler`] records the request, keeps
//! every slot's effective window current, and answers which items are
//! promoted now, which are next, and which recently stopped.

pub mod catalog;
pub mod config;
pub mod core;
pub mod events;
pub mod scheduler;
pub mod storage;
pub mod testing;

pub use catalog::{CatalogEntry, CatalogItem, PromotedItem, selection_options};
pub use config::{ConfigError, GlobalConfig, SlotConfig, StorageConfig, YamlLoader};
pub use core::clock::{Clock, SystemClock};
pub use core::time::{TimeError, TimeNormalizer, to_iso};
pub use core::types::{EntryId, ItemKey};
pub use events::{ClearScope, Event, EventBus, EventHandler, LoggingHandler};
pub use scheduler::{
    Projection, QueueItem, QueueView, SchedulerError, SlotScheduler, SlotState,
};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStorage;
pub use storage::{
    EntryStatus, InMemoryStorage, LockedSession, ScheduleEntry, Storage, StorageError,
    UnconfiguredStorage, open_storage,
};
