//! Catalog projection adapter.
//!
//! The catalog is owned elsewhere. This module only reads a snapshot of it:
//! to resolve display names, to build the admin picker, and to stamp items
//! with their current promotion state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::ItemKey;
use crate::storage::ScheduleEntry;

/// An item from the external catalog.
pub trait CatalogItem {
    /// Key that schedule entries refer to.
    fn item_key(&self) -> &str;

    /// Human-readable name.
    fn display_name(&self) -> &str;
}

/// Plain `{key, name}` catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
}

impl CatalogEntry {
    /// Create a catalog record.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

impl CatalogItem for CatalogEntry {
    fn item_key(&self) -> &str {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// A catalog item annotated with its promotion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotedItem<T> {
    #[serde(flatten)]
    pub item: T,
    pub is_promoted: bool,
    pub promoted_at: Option<DateTime<Utc>>,
    pub promoted_ends_at: Option<DateTime<Utc>>,
}

/// Options for the admin item picker, sorted by name.
///
/// Sorting ignores case; equal names fall back to key order.
pub fn selection_options<T: CatalogItem>(items: &[T]) -> Vec<CatalogEntry> {
    let mut options: Vec<CatalogEntry> = items
        .iter()
        .map(|item| CatalogEntry::new(item.item_key(), item.display_name()))
        .collect();
    options.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.key.cmp(&b.key))
    });
    options
}

/// Lookup from item key to display name.
pub(crate) fn name_lookup<T: CatalogItem>(items: &[T]) -> HashMap<&str, &str> {
    items
        .iter()
        .map(|item| (item.item_key(), item.display_name()))
        .collect()
}

/// Resolve a display name, falling back to the raw key.
pub(crate) fn resolve_name(lookup: &HashMap<&str, &str>, key: &ItemKey) -> String {
    lookup
        .get(key.as_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Stamp items with promotion state from the currently active entries.
///
/// When several active entries refer to the same item, the one that started
/// first wins.
pub fn apply_active_entries<T: CatalogItem>(
    items: Vec<T>,
    active: &[ScheduleEntry],
) -> Vec<PromotedItem<T>> {
    let mut by_key: HashMap<&str, &ScheduleEntry> = HashMap::new();
    for entry in active {
        by_key
            .entry(entry.item_key.as_str())
            .and_modify(|current| {
                if (entry.effective_start_at, &entry.id) < (current.effective_start_at, &current.id)
                {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }

    items
        .into_iter()
        .map(|item| {
            let promoted = by_key.get(item.item_key()).copied();
            PromotedItem {
                is_promoted: promoted.is_some(),
                promoted_at: promoted.map(|entry| entry.effective_start_at),
                promoted_ends_at: promoted.map(|entry| entry.effective_end_at),
                item,
            }
        })
        .collect()
}
