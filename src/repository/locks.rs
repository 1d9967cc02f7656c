//! Per-entity single-writer locks.
//!
//! A writer holds the lock of an item for the whole of its
//! read-modify-commit cycle, so two in-process editors never both build on
//! the same current version. Writers in other processes are caught by the
//! store's sequence check instead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while an item is being modified. Dropping it releases the lock.
#[derive(Debug)]
pub struct EntityLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl EntityLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Table of per-entity locks keyed by `entity_type/uid`.
///
/// Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(entity_type: &str, uid: &str) -> String {
        format!("{entity_type}/{uid}")
    }

    /// Wait for and take the lock of one item.
    pub async fn acquire(&self, entity_type: &str, uid: &str) -> EntityLockGuard {
        let key = Self::key(entity_type, uid);
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        EntityLockGuard {
            key,
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of entries currently in the table.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
