//! Fallback strategy for any pool the primary adapter supports

use super::{tier_outcome, StrategyContext};
use crate::error::{Error, Result};
use crate::types::{
    DataStoreRole, PoolType, SnapshotEvent, SnapshotId, SnapshotOperation, SnapshotRecord,
    SnapshotState, StrategyPriority,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backs up and deletes snapshots through the image store.
///
/// Cannot revert: a generic pool offers no in-place rollback.
pub struct DefaultSnapshotStrategy {
    ctx: Arc<StrategyContext>,
}

impl DefaultSnapshotStrategy {
    pub fn new(ctx: Arc<StrategyContext>) -> Self {
        Self { ctx }
    }

    /// Claims backup and delete only where the primary adapter can reach the
    /// pool. Deleting a snapshot with no live copy never touches a pool.
    pub fn can_handle(
        &self,
        snapshot: &SnapshotRecord,
        operation: SnapshotOperation,
    ) -> Result<StrategyPriority> {
        let primary_pool = self.ctx.primary_copy(snapshot.id)?.map(|(_, pool)| pool.pool_type);
        let reachable = |pool_type: PoolType| self.ctx.primary.supports(pool_type);

        Ok(match operation {
            SnapshotOperation::Revert => StrategyPriority::CantHandle,
            SnapshotOperation::Backup => match primary_pool {
                Some(pool_type) if reachable(pool_type) => StrategyPriority::Default,
                _ => StrategyPriority::CantHandle,
            },
            SnapshotOperation::Delete => match primary_pool {
                Some(pool_type) if has_live_copy(snapshot) && !reachable(pool_type) => {
                    StrategyPriority::CantHandle
                }
                _ => StrategyPriority::Default,
            },
        })
    }

    /// Delete a snapshot; the backup copy must go, the primary copy is best effort
    pub fn delete_snapshot(&self, id: SnapshotId) -> Result<bool> {
        let mut snapshot = self.ctx.load_snapshot(id)?;
        if let Some(done) = self.ctx.delete_without_live_copy(&snapshot)? {
            return Ok(done);
        }

        let on_backup = tier_outcome(
            id,
            DataStoreRole::Image,
            self.ctx.delete_on_backup_tier(&mut snapshot),
        );
        if !on_backup {
            return Ok(false);
        }

        if !tier_outcome(
            id,
            DataStoreRole::Primary,
            self.ctx.cleanup_on_primary_tier(&snapshot),
        ) {
            debug!(snapshot = %id, "primary copy left in place");
        }

        self.ctx.snapshots.remove(id)?;
        Ok(true)
    }

    /// Export the primary copy into the image store
    pub fn backup_snapshot(&self, id: SnapshotId) -> Result<bool> {
        let mut snapshot = self
            .ctx
            .snapshots
            .find_by_id(id)?
            .ok_or(Error::SnapshotNotFound(id))?;

        if self
            .ctx
            .snapshots
            .find_store_ref(id, DataStoreRole::Image)?
            .is_some()
        {
            info!(snapshot = %id, "snapshot already on backup storage");
            return Ok(true);
        }

        let (primary_ref, pool) = self.ctx.primary_copy(id)?.ok_or(Error::NotOnTier {
            snapshot: id,
            role: DataStoreRole::Primary,
        })?;

        self.ctx.emit(&mut snapshot, SnapshotEvent::BackupRequested)?;

        let install_path = self.ctx.backup.install_path(&snapshot);
        let exported = self
            .ctx
            .backup
            .prepare(&install_path)
            .and_then(|destination| {
                self.ctx
                    .primary
                    .export_snapshot(&pool, &primary_ref, &destination)
            });

        let ambiguous = |e: Error| Error::AmbiguousTierState {
            snapshot: id,
            reason: format!("backup finished but its outcome was not recorded: {}", e),
        };

        match exported {
            Ok(()) => {
                self.ctx
                    .snapshots
                    .persist_store_ref(
                        id,
                        DataStoreRole::Image,
                        self.ctx.backup.store_id(),
                        &install_path,
                    )
                    .map_err(ambiguous)?;
                self.ctx
                    .emit(&mut snapshot, SnapshotEvent::OperationSucceeded)
                    .map_err(ambiguous)?;
                info!(snapshot = %id, path = %install_path, "snapshot backed up");
                Ok(true)
            }
            Err(e) => {
                warn!(snapshot = %id, error = %e, "failed to back up snapshot");
                self.ctx
                    .emit(&mut snapshot, SnapshotEvent::OperationFailed)
                    .map_err(ambiguous)?;
                Ok(false)
            }
        }
    }
}

fn has_live_copy(snapshot: &SnapshotRecord) -> bool {
    !snapshot.removed
        && !matches!(
            snapshot.state,
            SnapshotState::Allocated | SnapshotState::Destroyed | SnapshotState::Error
        )
}
