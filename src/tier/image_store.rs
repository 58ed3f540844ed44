//! Backup tier on a mounted secondary image store

use super::BackupTier;
use crate::error::Result;
use crate::types::{SnapshotRecord, StoreRef};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Configuration for the image store backup tier
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageStoreConfig {
    /// Mount point of the secondary store (e.g., /mnt/secondary)
    pub root: PathBuf,
    /// Id of the image store recorded in store references
    pub store_id: u64,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/mnt/secondary"),
            store_id: 1,
        }
    }
}

/// Backup tier that keeps snapshot archives as files under a root directory
pub struct ImageStoreBackupTier {
    config: ImageStoreConfig,
}

impl ImageStoreBackupTier {
    pub fn new(config: ImageStoreConfig) -> Self {
        Self { config }
    }

    fn absolute(&self, install_path: &str) -> PathBuf {
        self.config.root.join(install_path.trim_start_matches('/'))
    }
}

impl BackupTier for ImageStoreBackupTier {
    fn store_id(&self) -> u64 {
        self.config.store_id
    }

    fn install_path(&self, snapshot: &SnapshotRecord) -> String {
        format!("snapshots/{}/{}.raw", snapshot.volume_id, snapshot.id)
    }

    fn prepare(&self, install_path: &str) -> Result<PathBuf> {
        let path = self.absolute(install_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn delete(&self, store_ref: &StoreRef) -> Result<()> {
        let path = self.absolute(&store_ref.install_path);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "deleted snapshot backup");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "snapshot backup already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
