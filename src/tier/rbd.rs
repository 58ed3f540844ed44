//! Ceph RBD primary tier driven through the `rbd` CLI

use super::PrimaryTier;
use crate::error::{Error, Result};
use crate::types::{PoolType, StoragePool, StoreRef, VolumeRecord};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Configuration for the RBD primary tier
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RbdConfig {
    /// Path to the rbd binary
    pub binary: String,
    /// Ceph client id passed as `--id`
    pub client_id: String,
    /// Monitor address passed as `-m`, if not taken from ceph.conf
    pub monitor: Option<String>,
}

impl Default for RbdConfig {
    fn default() -> Self {
        Self {
            binary: "rbd".to_string(),
            client_id: "admin".to_string(),
            monitor: None,
        }
    }
}

/// Primary tier on a Ceph RBD pool
pub struct RbdPrimaryTier {
    config: RbdConfig,
}

impl RbdPrimaryTier {
    pub fn new(config: RbdConfig) -> Self {
        Self { config }
    }

    fn ensure_rbd(&self, pool: &StoragePool) -> Result<()> {
        if !self.supports(pool.pool_type) {
            return Err(Error::UnsupportedPool {
                pool: pool.id,
                pool_type: pool.pool_type,
            });
        }
        Ok(())
    }

    /// Full argument list for an rbd invocation against `pool`
    fn args(&self, pool: &StoragePool, action: &[&str]) -> Vec<String> {
        let mut args = vec!["--id".to_string(), self.config.client_id.clone()];
        if let Some(monitor) = &self.config.monitor {
            args.push("-m".to_string());
            args.push(monitor.clone());
        }
        args.push("--pool".to_string());
        args.push(pool.source.clone());
        args.extend(action.iter().map(|a| a.to_string()));
        args
    }

    /// Run rbd and return stdout
    fn run(&self, args: &[String]) -> Result<String> {
        debug!(binary = %self.config.binary, args = ?args, "running rbd");
        let output = Command::new(&self.config.binary).args(args).output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {}", self.config.binary, args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl PrimaryTier for RbdPrimaryTier {
    fn supports(&self, pool_type: PoolType) -> bool {
        pool_type == PoolType::Rbd
    }

    fn revert_snapshot(
        &self,
        pool: &StoragePool,
        volume: &VolumeRecord,
        store_ref: &StoreRef,
    ) -> Result<()> {
        self.ensure_rbd(pool)?;
        info!(
            pool = %pool.source,
            volume = %volume.path,
            snapshot = %store_ref.install_path,
            "rolling back RBD image"
        );
        self.run(&self.args(pool, &["snap", "rollback", &store_ref.install_path]))?;
        Ok(())
    }

    fn delete_snapshot(&self, pool: &StoragePool, store_ref: &StoreRef) -> Result<()> {
        self.ensure_rbd(pool)?;
        info!(pool = %pool.source, snapshot = %store_ref.install_path, "removing RBD snapshot");
        self.run(&self.args(pool, &["snap", "rm", &store_ref.install_path]))?;
        Ok(())
    }

    fn export_snapshot(
        &self,
        pool: &StoragePool,
        store_ref: &StoreRef,
        destination: &Path,
    ) -> Result<()> {
        self.ensure_rbd(pool)?;
        let destination = destination.to_string_lossy();
        info!(
            pool = %pool.source,
            snapshot = %store_ref.install_path,
            destination = %destination,
            "exporting RBD snapshot"
        );
        self.run(&self.args(pool, &["export", &store_ref.install_path, &destination]))?;
        Ok(())
    }
}
