//! Snapshot strategies and the dispatcher that picks between them
//!
//! A strategy is bound to one storage-backend family. It reports how strongly
//! it claims a (snapshot, operation) pair and implements the operations it
//! claims. The set of strategies is closed: see [`Strategy`].

mod default;
mod dispatcher;
mod rbd;

pub use default::DefaultSnapshotStrategy;
pub use dispatcher::StrategyDispatcher;
pub use rbd::RbdSnapshotStrategy;

use crate::error::{Error, Result};
use crate::state_machine;
use crate::store::{PoolStore, SnapshotStore, VolumeStore};
use crate::tier::{BackupTier, PrimaryTier};
use crate::types::{
    DataStoreRole, PoolId, SnapshotEvent, SnapshotId, SnapshotOperation, SnapshotRecord,
    SnapshotState, StoragePool, StoreRef, StrategyPriority,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborators shared by every strategy
pub struct StrategyContext {
    pub snapshots: Arc<dyn SnapshotStore>,
    pub volumes: Arc<dyn VolumeStore>,
    pub pools: Arc<dyn PoolStore>,
    pub primary: Arc<dyn PrimaryTier>,
    pub backup: Arc<dyn BackupTier>,
}

impl StrategyContext {
    /// Load a snapshot record, including a logically removed one
    pub(crate) fn load_snapshot(&self, id: SnapshotId) -> Result<SnapshotRecord> {
        self.snapshots
            .find_by_id_including_removed(id)?
            .ok_or(Error::SnapshotNotFound(id))
    }

    /// Apply `event` and persist the resulting state
    pub(crate) fn emit(
        &self,
        snapshot: &mut SnapshotRecord,
        event: SnapshotEvent,
    ) -> Result<SnapshotState> {
        let state = state_machine::transition(snapshot, event)?;
        self.snapshots.update_state(snapshot.id, state)?;
        debug!(snapshot = %snapshot.id, %event, %state, "snapshot state changed");
        Ok(state)
    }

    /// The primary-tier copy of a snapshot and the pool it lives on
    pub(crate) fn primary_copy(&self, id: SnapshotId) -> Result<Option<(StoreRef, StoragePool)>> {
        let Some(store_ref) = self.snapshots.find_store_ref(id, DataStoreRole::Primary)? else {
            return Ok(None);
        };
        let pool = self.pools.find_by_id(PoolId(store_ref.store_id))?;
        Ok(pool.map(|pool| (store_ref, pool)))
    }

    /// Delete policy for snapshots with no live copy to reconcile.
    ///
    /// Returns `Some(result)` when the snapshot was fully handled, `None` when
    /// the caller must clean up its tiers.
    pub(crate) fn delete_without_live_copy(
        &self,
        snapshot: &SnapshotRecord,
    ) -> Result<Option<bool>> {
        if snapshot.removed {
            debug!(snapshot = %snapshot.id, "snapshot already removed");
            return Ok(Some(true));
        }

        match snapshot.state {
            SnapshotState::Allocated => {
                self.snapshots.remove(snapshot.id)?;
                info!(snapshot = %snapshot.id, "removed allocated snapshot with no physical copy");
                Ok(Some(true))
            }
            SnapshotState::Destroyed => Ok(Some(true)),
            SnapshotState::Error => {
                let refs = self.snapshots.find_store_refs(snapshot.id)?;
                for store_ref in &refs {
                    self.snapshots.expunge(store_ref.id)?;
                }
                self.snapshots.remove(snapshot.id)?;
                warn!(
                    snapshot = %snapshot.id,
                    expunged = refs.len(),
                    "force-removed snapshot in Error state"
                );
                Ok(Some(true))
            }
            _ => Ok(None),
        }
    }

    /// Delete the backup-tier copy, driving the state machine around the call.
    ///
    /// `Ok(true)` also covers a snapshot that was never backed up. An invalid
    /// `DestroyRequested` is tolerated; a failed completion event is not, and
    /// neither is a completion with no destroy edge to record it on.
    pub(crate) fn delete_on_backup_tier(&self, snapshot: &mut SnapshotRecord) -> Result<bool> {
        let Some(image_ref) = self
            .snapshots
            .find_store_ref(snapshot.id, DataStoreRole::Image)?
        else {
            debug!(snapshot = %snapshot.id, "no copy on backup storage; deleting catalog record only");
            return Ok(true);
        };

        match self.emit(snapshot, SnapshotEvent::DestroyRequested) {
            Ok(_) => {}
            Err(e @ Error::InvalidTransition { .. }) => {
                debug!(snapshot = %snapshot.id, error = %e, "failed to move snapshot to Destroying");
            }
            Err(e) => return Err(e),
        }

        let deleted = match self.backup.delete(&image_ref) {
            Ok(()) => true,
            Err(e) => {
                warn!(snapshot = %snapshot.id, error = %e, "failed to delete snapshot on backup storage");
                false
            }
        };

        let event = if deleted {
            SnapshotEvent::OperationSucceeded
        } else {
            SnapshotEvent::OperationFailed
        };

        // Outside Destroying the completion event would take another edge.
        if snapshot.state != SnapshotState::Destroying {
            return Err(Error::AmbiguousTierState {
                snapshot: snapshot.id,
                reason: format!(
                    "backup delete finished but {} cannot be recorded from {}",
                    event, snapshot.state
                ),
            });
        }

        self.emit(snapshot, event)
            .map_err(|e| Error::AmbiguousTierState {
                snapshot: snapshot.id,
                reason: format!("backup delete finished but {} was not recorded: {}", event, e),
            })?;

        if deleted {
            self.snapshots.expunge(image_ref.id)?;
        }
        Ok(deleted)
    }

    /// Remove the primary-tier copy; `Ok(false)` if there is none or removal failed
    pub(crate) fn cleanup_on_primary_tier(&self, snapshot: &SnapshotRecord) -> Result<bool> {
        let Some((store_ref, pool)) = self.primary_copy(snapshot.id)? else {
            debug!(snapshot = %snapshot.id, "no copy on primary storage");
            return Ok(false);
        };

        match self.primary.delete_snapshot(&pool, &store_ref) {
            Ok(()) => {
                self.snapshots.expunge(store_ref.id)?;
                Ok(true)
            }
            Err(e) => {
                warn!(
                    snapshot = %snapshot.id,
                    pool = %pool.id,
                    error = %e,
                    "failed to delete snapshot on primary storage"
                );
                Ok(false)
            }
        }
    }
}

/// Collapse a tier sub-operation into success or failure, logging errors
pub(crate) fn tier_outcome(snapshot: SnapshotId, tier: DataStoreRole, result: Result<bool>) -> bool {
    match result {
        Ok(done) => done,
        Err(e) => {
            warn!(%snapshot, %tier, error = %e, "tier cleanup failed");
            false
        }
    }
}

/// The closed set of strategies, in no particular priority
pub enum Strategy {
    Rbd(RbdSnapshotStrategy),
    Default(DefaultSnapshotStrategy),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Rbd(_) => "rbd",
            Strategy::Default(_) => "default",
        }
    }

    /// How strongly this strategy claims `operation` on `snapshot`
    pub fn can_handle(
        &self,
        snapshot: &SnapshotRecord,
        operation: SnapshotOperation,
    ) -> Result<StrategyPriority> {
        match self {
            Strategy::Rbd(s) => s.can_handle(snapshot, operation),
            Strategy::Default(s) => s.can_handle(snapshot, operation),
        }
    }

    /// Delete a snapshot; `Ok(false)` leaves it in place for a retry
    pub fn delete_snapshot(&self, id: SnapshotId) -> Result<bool> {
        match self {
            Strategy::Rbd(s) => s.delete_snapshot(id),
            Strategy::Default(s) => s.delete_snapshot(id),
        }
    }

    /// Roll the snapshot's volume back to it
    pub fn revert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<bool> {
        match self {
            Strategy::Rbd(s) => s.revert_snapshot(snapshot),
            Strategy::Default(_) => Err(Error::NoStrategyAvailable {
                snapshot: snapshot.id,
                operation: SnapshotOperation::Revert,
            }),
        }
    }

    /// Copy the primary-tier snapshot to the backup tier
    pub fn backup_snapshot(&self, id: SnapshotId) -> Result<bool> {
        match self {
            Strategy::Rbd(_) => Err(Error::NoStrategyAvailable {
                snapshot: id,
                operation: SnapshotOperation::Backup,
            }),
            Strategy::Default(s) => s.backup_snapshot(id),
        }
    }
}
