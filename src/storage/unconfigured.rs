//! Placeholder backend used when no store is configured.

use async_trait::async_trait;

use super::{LockedSession, Storage, StorageError};

/// Storage that refuses every session.
///
/// Lets the scheduler start without a backing store. Mutations then fail
/// with [`StorageError::NotConfigured`] and reads degrade to empty results.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredStorage;

impl UnconfiguredStorage {
    /// Create the placeholder.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for UnconfiguredStorage {
    async fn locked_session<'a>(&'a self) -> Result<Box<dyn LockedSession + 'a>, StorageError> {
        Err(StorageError::NotConfigured(
            "set `storage` in spotlight.yaml to a memory or sqlite backend".to_string(),
        ))
    }
}
