//! Per-snapshot serialization
//!
//! Each snapshot id gets its own mutex, created on first use and dropped once
//! nobody holds or waits on it. Operations on different snapshots never
//! contend.

use crate::error::{Error, Result};
use crate::types::SnapshotId;
use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Default lock acquisition timeout (30 seconds)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;

/// Lock settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

/// Lock table keyed by snapshot id
pub struct SnapshotLocks {
    locks: DashMap<SnapshotId, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held while an operation runs on one snapshot
pub struct SnapshotGuard<'a> {
    owner: &'a SnapshotLocks,
    id: SnapshotId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl SnapshotLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms))
    }

    /// Block until the lock for `id` is free or the timeout elapses
    pub fn acquire(&self, id: SnapshotId) -> Result<SnapshotGuard<'_>> {
        // The shard lock must be released before blocking on the mutex.
        let lock = Arc::clone(
            self.locks
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        match lock.try_lock_arc_for(self.timeout) {
            Some(guard) => Ok(SnapshotGuard {
                owner: self,
                id,
                guard: Some(guard),
            }),
            None => {
                drop(lock);
                self.release(id);
                Err(Error::LockTimeout(id))
            }
        }
    }

    /// Number of ids with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop the entry for `id` if only the table still references it
    fn release(&self, id: SnapshotId) {
        self.locks
            .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(self.id);
    }
}

impl Default for SnapshotLocks {
    fn default() -> Self {
        Self::from_config(&LockConfig::default())
    }
}
