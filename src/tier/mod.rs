//! Storage tier adapters
//!
//! The primary tier holds the block-storage snapshot used for revert; the
//! backup tier holds the archived copy on the image store. The two fail
//! independently and callers reconcile their results.

mod image_store;
mod rbd;

pub use image_store::{ImageStoreBackupTier, ImageStoreConfig};
pub use rbd::{RbdConfig, RbdPrimaryTier};

use crate::error::Result;
use crate::types::{PoolType, SnapshotRecord, StoragePool, StoreRef, VolumeRecord};
use std::path::{Path, PathBuf};

/// Operations on the primary block-storage pool
pub trait PrimaryTier: Send + Sync {
    /// Whether this adapter can operate on pools of `pool_type`
    fn supports(&self, pool_type: PoolType) -> bool;

    /// Roll `volume` back to the snapshot referenced by `store_ref`
    fn revert_snapshot(
        &self,
        pool: &StoragePool,
        volume: &VolumeRecord,
        store_ref: &StoreRef,
    ) -> Result<()>;

    /// Remove the snapshot from the pool
    fn delete_snapshot(&self, pool: &StoragePool, store_ref: &StoreRef) -> Result<()>;

    /// Write the snapshot contents to `destination`
    fn export_snapshot(
        &self,
        pool: &StoragePool,
        store_ref: &StoreRef,
        destination: &Path,
    ) -> Result<()>;
}

/// Operations on the secondary backup/image store
pub trait BackupTier: Send + Sync {
    /// Id recorded in `Image` store references
    fn store_id(&self) -> u64;

    /// Relative install path for a new backup of `snapshot`
    fn install_path(&self, snapshot: &SnapshotRecord) -> String;

    /// Make room for `install_path` and return its absolute location
    fn prepare(&self, install_path: &str) -> Result<PathBuf>;

    /// Delete the archived copy behind `store_ref`
    fn delete(&self, store_ref: &StoreRef) -> Result<()>;
}
