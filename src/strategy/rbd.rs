//! Strategy for snapshots stored on Ceph RBD primary pools

use super::{tier_outcome, StrategyContext};
use crate::error::{Error, Result};
use crate::state_machine;
use crate::types::{
    DataStoreRole, ImageFormat, PoolType, SnapshotEvent, SnapshotId, SnapshotOperation,
    SnapshotRecord, StrategyPriority,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handles revert and delete for snapshots whose primary copy is on RBD
///
/// RBD snapshots can be rolled back in place, so this strategy outranks the
/// generic one for any live volume on an RBD pool.
pub struct RbdSnapshotStrategy {
    ctx: Arc<StrategyContext>,
}

impl RbdSnapshotStrategy {
    pub fn new(ctx: Arc<StrategyContext>) -> Self {
        Self { ctx }
    }

    pub fn can_handle(
        &self,
        snapshot: &SnapshotRecord,
        operation: SnapshotOperation,
    ) -> Result<StrategyPriority> {
        let volume = self
            .ctx
            .volumes
            .find_by_id_including_removed(snapshot.volume_id)?;
        match volume {
            Some(volume) if !volume.removed => {}
            _ => return Ok(StrategyPriority::CantHandle),
        }

        if !self.is_stored_on_rbd(snapshot.id)? {
            return Ok(StrategyPriority::CantHandle);
        }

        Ok(match operation {
            SnapshotOperation::Revert | SnapshotOperation::Delete => StrategyPriority::Highest,
            SnapshotOperation::Backup => StrategyPriority::CantHandle,
        })
    }

    fn is_stored_on_rbd(&self, id: SnapshotId) -> Result<bool> {
        Ok(matches!(
            self.ctx.primary_copy(id)?,
            Some((_, pool)) if pool.pool_type == PoolType::Rbd
        ))
    }

    /// Roll the base volume back to `snapshot`; only RAW volumes are supported
    pub fn revert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<bool> {
        let volume = self
            .ctx
            .volumes
            .find_by_id_including_removed(snapshot.volume_id)?
            .ok_or(Error::VolumeNotFound(snapshot.volume_id))?;

        if volume.format != ImageFormat::Raw {
            error!(
                snapshot = %snapshot.id,
                format = %volume.format,
                "cannot revert snapshot on RBD; only RAW images can be rolled back"
            );
            return Err(Error::UnsupportedFormat {
                volume: volume.id,
                format: volume.format,
            });
        }

        state_machine::next_state(snapshot.state, SnapshotEvent::RevertRequested).ok_or(
            Error::InvalidTransition {
                state: snapshot.state,
                event: SnapshotEvent::RevertRequested,
            },
        )?;

        let (store_ref, pool) =
            self.ctx
                .primary_copy(snapshot.id)?
                .ok_or(Error::NotOnTier {
                    snapshot: snapshot.id,
                    role: DataStoreRole::Primary,
                })?;

        match self.ctx.primary.revert_snapshot(&pool, &volume, &store_ref) {
            Ok(()) => {
                info!(snapshot = %snapshot.id, volume = %volume.id, "reverted volume to snapshot");
                Ok(true)
            }
            Err(e) => {
                error!(snapshot = %snapshot.id, volume = %volume.id, error = %e, "failed to revert snapshot");
                Ok(false)
            }
        }
    }

    /// Delete a snapshot, succeeding if either tier lets go of its copy
    pub fn delete_snapshot(&self, id: SnapshotId) -> Result<bool> {
        let mut snapshot = self.ctx.load_snapshot(id)?;
        if let Some(done) = self.ctx.delete_without_live_copy(&snapshot)? {
            return Ok(done);
        }

        // A snapshot may live on only one tier, so both calls always run.
        let on_backup = tier_outcome(
            id,
            DataStoreRole::Image,
            self.ctx.delete_on_backup_tier(&mut snapshot),
        );
        let on_primary = tier_outcome(
            id,
            DataStoreRole::Primary,
            self.ctx.cleanup_on_primary_tier(&snapshot),
        );

        if on_backup || on_primary {
            self.ctx.snapshots.remove(id)?;
            debug!(snapshot = %id, on_backup, on_primary, "snapshot deleted");
            return Ok(true);
        }

        warn!(snapshot = %id, "snapshot could not be deleted on either tier");
        Ok(false)
    }
}
