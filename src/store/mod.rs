//! Persistence collaborators and the JSON catalog implementation

mod catalog;

pub use catalog::{Catalog, CatalogData};

use crate::error::Result;
use crate::types::{
    DataStoreRole, PoolId, SnapshotId, SnapshotRecord, SnapshotState, StoragePool, StoreRef,
    StoreRefId, VolumeId, VolumeRecord,
};

/// Snapshot records and their store references
pub trait SnapshotStore: Send + Sync {
    /// Find a snapshot that has not been removed
    fn find_by_id(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>>;

    /// Find a snapshot, including logically removed ones
    fn find_by_id_including_removed(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>>;

    /// List all snapshots that have not been removed
    fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>>;

    /// Persist a state produced by the state machine
    fn update_state(&self, id: SnapshotId, state: SnapshotState) -> Result<()>;

    /// Logically remove a snapshot record
    fn remove(&self, id: SnapshotId) -> Result<()>;

    /// Find the store reference for a snapshot on one tier
    fn find_store_ref(&self, id: SnapshotId, role: DataStoreRole) -> Result<Option<StoreRef>>;

    /// All store references for a snapshot, on any tier
    fn find_store_refs(&self, id: SnapshotId) -> Result<Vec<StoreRef>>;

    /// Record a new physical copy and return its reference
    fn persist_store_ref(
        &self,
        id: SnapshotId,
        role: DataStoreRole,
        store_id: u64,
        install_path: &str,
    ) -> Result<StoreRef>;

    /// Physically delete a store-reference record
    fn expunge(&self, store_ref: StoreRefId) -> Result<()>;
}

/// Volume lookups
pub trait VolumeStore: Send + Sync {
    fn find_by_id_including_removed(&self, id: VolumeId) -> Result<Option<VolumeRecord>>;
}

/// Storage pool lookups
pub trait PoolStore: Send + Sync {
    fn find_by_id(&self, id: PoolId) -> Result<Option<StoragePool>>;
}
