//! Per-key cache slot.

use bytes::Bytes;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single cached value and the lock serializing its population.
///
/// The value starts unset (`None`) and is written exactly once by the
/// caller holding the exclusive lock. After that it is only read; an entry
/// is replaced at table level, never mutated in place.
#[derive(Debug)]
pub(crate) struct Entry {
    id: u64,
    value: RwLock<Option<Bytes>>,
}

impl Entry {
    /// Creates an empty entry.
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            value: RwLock::new(None),
        }
    }

    /// Returns the entry id, unique within its cache.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Waits for shared access to the value.
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, Option<Bytes>> {
        self.value.read().await
    }

    /// Waits for exclusive access to the value.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Option<Bytes>> {
        self.value.write().await
    }
}
