//! JSON-file catalog of snapshots, volumes, pools and store references

use super::{PoolStore, SnapshotStore, VolumeStore};
use crate::error::{Error, Result};
use crate::types::{
    DataStoreRole, PoolId, SnapshotId, SnapshotRecord, SnapshotState, StoragePool, StoreRef,
    StoreRefId, VolumeId, VolumeRecord,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serialized catalog contents
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
    #[serde(default)]
    pub volumes: Vec<VolumeRecord>,
    #[serde(default)]
    pub pools: Vec<StoragePool>,
    #[serde(default)]
    pub store_refs: Vec<StoreRef>,
}

/// Catalog backed by a JSON file, or held only in memory
///
/// Every mutation rewrites the file when one is configured.
pub struct Catalog {
    path: Option<PathBuf>,
    data: Mutex<CatalogData>,
}

impl Catalog {
    /// Open the catalog at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            CatalogData::default()
        };
        debug!(path = %path.display(), "opened snapshot catalog");
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// Catalog that never touches the filesystem
    pub fn in_memory(data: CatalogData) -> Self {
        Self {
            path: None,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current contents
    pub fn snapshot_data(&self) -> CatalogData {
        self.data.lock().clone()
    }

    fn save(&self, data: &CatalogData) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let content = serde_json::to_string_pretty(data)?;
            fs::write(path, content)?;
        }
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut CatalogData) -> Result<T>) -> Result<T> {
        let mut data = self.data.lock();
        let value = f(&mut data)?;
        self.save(&data)?;
        Ok(value)
    }
}

impl SnapshotStore for Catalog {
    fn find_by_id(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>> {
        let data = self.data.lock();
        Ok(data
            .snapshots
            .iter()
            .find(|s| s.id == id && !s.removed)
            .cloned())
    }

    fn find_by_id_including_removed(&self, id: SnapshotId) -> Result<Option<SnapshotRecord>> {
        let data = self.data.lock();
        Ok(data.snapshots.iter().find(|s| s.id == id).cloned())
    }

    fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        let data = self.data.lock();
        Ok(data.snapshots.iter().filter(|s| !s.removed).cloned().collect())
    }

    fn update_state(&self, id: SnapshotId, state: SnapshotState) -> Result<()> {
        self.mutate(|data| {
            let snapshot = data
                .snapshots
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(Error::SnapshotNotFound(id))?;
            snapshot.state = state;
            Ok(())
        })
    }

    fn remove(&self, id: SnapshotId) -> Result<()> {
        self.mutate(|data| {
            let snapshot = data
                .snapshots
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(Error::SnapshotNotFound(id))?;
            snapshot.removed = true;
            Ok(())
        })
    }

    fn find_store_ref(&self, id: SnapshotId, role: DataStoreRole) -> Result<Option<StoreRef>> {
        let data = self.data.lock();
        Ok(data
            .store_refs
            .iter()
            .find(|r| r.snapshot_id == id && r.role == role)
            .cloned())
    }

    fn find_store_refs(&self, id: SnapshotId) -> Result<Vec<StoreRef>> {
        let data = self.data.lock();
        Ok(data
            .store_refs
            .iter()
            .filter(|r| r.snapshot_id == id)
            .cloned()
            .collect())
    }

    fn persist_store_ref(
        &self,
        id: SnapshotId,
        role: DataStoreRole,
        store_id: u64,
        install_path: &str,
    ) -> Result<StoreRef> {
        self.mutate(|data| {
            let next_id = data.store_refs.iter().map(|r| r.id.get()).max().unwrap_or(0) + 1;
            let store_ref = StoreRef {
                id: StoreRefId(next_id),
                snapshot_id: id,
                role,
                store_id,
                install_path: install_path.to_string(),
            };
            data.store_refs.push(store_ref.clone());
            Ok(store_ref)
        })
    }

    fn expunge(&self, store_ref: StoreRefId) -> Result<()> {
        self.mutate(|data| {
            data.store_refs.retain(|r| r.id != store_ref);
            Ok(())
        })
    }
}

impl VolumeStore for Catalog {
    fn find_by_id_including_removed(&self, id: VolumeId) -> Result<Option<VolumeRecord>> {
        let data = self.data.lock();
        Ok(data.volumes.iter().find(|v| v.id == id).cloned())
    }
}

impl PoolStore for Catalog {
    fn find_by_id(&self, id: PoolId) -> Result<Option<StoragePool>> {
        let data = self.data.lock();
        Ok(data.pools.iter().find(|p| p.id == id).cloned())
    }
}
