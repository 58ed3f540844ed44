#![allow(dead_code)]

use parking_lot::Mutex;
use snapshot_lifecycle::store::{Catalog, CatalogData, SnapshotStore};
use snapshot_lifecycle::tier::{BackupTier, PrimaryTier};
use snapshot_lifecycle::{
    DataStoreRole, Error, ImageFormat, PoolId, PoolType, Result, SnapshotId, SnapshotRecord,
    SnapshotState, StoragePool, StoreRef, StoreRefId, StrategyContext, VolumeId, VolumeRecord,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SNAPSHOT: SnapshotId = SnapshotId(1);
pub const VOLUME: VolumeId = VolumeId(10);
pub const POOL: PoolId = PoolId(100);
pub const IMAGE_STORE: u64 = 7;

/// Primary tier that records calls and fails on demand
#[derive(Default)]
pub struct FakePrimary {
    pub fail_revert: bool,
    pub fail_delete: bool,
    pub fail_export: bool,
    pub unsupported: Vec<PoolType>,
    pub reverts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub exports: AtomicUsize,
}

impl FakePrimary {
    pub fn calls(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.exports.load(Ordering::SeqCst)
    }
}

fn fail_if(fail: bool, what: &str) -> Result<()> {
    if fail {
        Err(Error::CommandFailed {
            command: what.to_string(),
            stderr: "simulated failure".to_string(),
        })
    } else {
        Ok(())
    }
}

impl PrimaryTier for FakePrimary {
    fn supports(&self, pool_type: PoolType) -> bool {
        !self.unsupported.contains(&pool_type)
    }

    fn revert_snapshot(&self, _: &StoragePool, _: &VolumeRecord, _: &StoreRef) -> Result<()> {
        self.reverts.fetch_add(1, Ordering::SeqCst);
        fail_if(self.fail_revert, "rbd snap rollback")
    }

    fn delete_snapshot(&self, _: &StoragePool, _: &StoreRef) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        fail_if(self.fail_delete, "rbd snap rm")
    }

    fn export_snapshot(&self, _: &StoragePool, _: &StoreRef, _: &Path) -> Result<()> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        fail_if(self.fail_export, "rbd export")
    }
}

/// Backup tier that records calls and fails on demand
#[derive(Default)]
pub struct FakeBackup {
    pub fail_delete: bool,
    pub deletes: AtomicUsize,
}

impl FakeBackup {
    pub fn calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl BackupTier for FakeBackup {
    fn store_id(&self) -> u64 {
        IMAGE_STORE
    }

    fn install_path(&self, snapshot: &SnapshotRecord) -> String {
        format!("snapshots/{}/{}.raw", snapshot.volume_id, snapshot.id)
    }

    fn prepare(&self, install_path: &str) -> Result<PathBuf> {
        Ok(Path::new("/backup").join(install_path))
    }

    fn delete(&self, _: &StoreRef) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        fail_if(self.fail_delete, "rm backup")
    }
}

/// Catalog wrapper that counts expunges and can refuse a state write
pub struct CountingStore {
    pub inner: Arc<Catalog>,
    pub expunges: AtomicUsize,
    pub reject_state: Mutex<Option<SnapshotState>>,
}

impl SnapshotStore for CountingStore {
    fn find_by_id(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>> {
        SnapshotStore::find_by_id(self.inner.as_ref(), id)
    }

    fn find_by_id_including_removed(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>> {
        SnapshotStore::find_by_id_including_removed(self.inner.as_ref(), id)
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        self.inner.list_snapshots()
    }

    fn update_state(&self, id: SnapshotId, state: SnapshotState) -> Result<()> {
        if *self.reject_state.lock() == Some(state) {
            return Err(Error::Other(format!("refusing to persist {}", state)));
        }
        self.inner.update_state(id, state)
    }

    fn remove(&self, id: SnapshotId) -> Result<()> {
        self.inner.remove(id)
    }

    fn find_store_ref(&self, id: SnapshotId, role: DataStoreRole) -> Result<Option<StoreRef>> {
        self.inner.find_store_ref(id, role)
    }

    fn find_store_refs(&self, id: SnapshotId) -> Result<Vec<StoreRef>> {
        self.inner.find_store_refs(id)
    }

    fn persist_store_ref(
        &self,
        id: SnapshotId,
        role: DataStoreRole,
        store_id: u64,
        install_path: &str,
    ) -> Result<StoreRef> {
        self.inner.persist_store_ref(id, role, store_id, install_path)
    }

    fn expunge(&self, store_ref: StoreRefId) -> Result<()> {
        self.expunges.fetch_add(1, Ordering::SeqCst);
        self.inner.expunge(store_ref)
    }
}

pub struct Fixture {
    pub catalog: Arc<Catalog>,
    pub store: Arc<CountingStore>,
    pub primary: Arc<FakePrimary>,
    pub backup: Arc<FakeBackup>,
    pub ctx: Arc<StrategyContext>,
}

impl Fixture {
    pub fn new(data: CatalogData, primary: FakePrimary, backup: FakeBackup) -> Self {
        let catalog = Arc::new(Catalog::in_memory(data));
        let store = Arc::new(CountingStore {
            inner: Arc::clone(&catalog),
            expunges: AtomicUsize::new(0),
            reject_state: Mutex::new(None),
        });
        let primary = Arc::new(primary);
        let backup = Arc::new(backup);
        let ctx = Arc::new(StrategyContext {
            snapshots: store.clone(),
            volumes: catalog.clone(),
            pools: catalog.clone(),
            primary: primary.clone(),
            backup: backup.clone(),
        });
        Self {
            catalog,
            store,
            primary,
            backup,
            ctx,
        }
    }

    pub fn snapshot(&self) -> SnapshotRecord {
        SnapshotStore::find_by_id_including_removed(self.catalog.as_ref(), SNAPSHOT)
            .unwrap()
            .unwrap()
    }

    pub fn is_queryable(&self) -> bool {
        SnapshotStore::find_by_id(self.catalog.as_ref(), SNAPSHOT)
            .unwrap()
            .is_some()
    }

    pub fn refs(&self) -> Vec<StoreRef> {
        self.catalog.find_store_refs(SNAPSHOT).unwrap()
    }
}

/// Catalog builder for a single snapshot of a single volume
pub struct Scenario {
    pub state: SnapshotState,
    pub format: ImageFormat,
    pub pool_type: PoolType,
    pub volume_removed: bool,
    pub copies: Vec<DataStoreRole>,
}

impl Scenario {
    pub fn rbd(state: SnapshotState, copies: &[DataStoreRole]) -> Self {
        Self {
            state,
            format: ImageFormat::Raw,
            pool_type: PoolType::Rbd,
            volume_removed: false,
            copies: copies.to_vec(),
        }
    }

    pub fn build(&self) -> CatalogData {
        let store_refs = self
            .copies
            .iter()
            .enumerate()
            .map(|(i, role)| StoreRef {
                id: StoreRefId(i as u64 + 1),
                snapshot_id: SNAPSHOT,
                role: *role,
                store_id: match role {
                    DataStoreRole::Primary => POOL.get(),
                    DataStoreRole::Image => IMAGE_STORE,
                },
                install_path: match role {
                    DataStoreRole::Primary => "vol-10@snap-1".to_string(),
                    DataStoreRole::Image => "snapshots/10/1.raw".to_string(),
                },
            })
            .collect();

        CatalogData {
            snapshots: vec![SnapshotRecord {
                id: SNAPSHOT,
                volume_id: VOLUME,
                name: "before-upgrade".to_string(),
                state: self.state,
                removed: false,
            }],
            volumes: vec![VolumeRecord {
                id: VOLUME,
                name: "root-disk".to_string(),
                format: self.format,
                path: "vol-10".to_string(),
                removed: self.volume_removed,
            }],
            pools: vec![StoragePool {
                id: POOL,
                name: "primary".to_string(),
                pool_type: self.pool_type,
                source: "cloudstack".to_string(),
            }],
            store_refs,
        }
    }
}
