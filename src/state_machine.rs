//! Snapshot lifecycle state machine
//!
//! Pure transition table. Callers persist the resulting state themselves.

use crate::error::{Error, Result};
use crate::types::{SnapshotEvent, SnapshotRecord, SnapshotState};

/// Next state for `state` on `event`, or `None` if there is no edge
pub fn next_state(state: SnapshotState, event: SnapshotEvent) -> Option<SnapshotState> {
    use SnapshotEvent::*;
    use SnapshotState::*;

    match (state, event) {
        (CreatedOnPrimary, BackupRequested) => Some(BackingUp),
        (BackingUp, OperationSucceeded) => Some(BackedUp),
        (BackingUp, OperationFailed) => Some(CreatedOnPrimary),

        (CreatedOnPrimary | BackedUp, DestroyRequested) => Some(Destroying),
        (Destroying, OperationSucceeded) => Some(Destroyed),
        (Destroying, OperationFailed) => Some(SnapshotState::Error),

        (CreatedOnPrimary, RevertRequested) => Some(CreatedOnPrimary),
        (BackedUp, RevertRequested) => Some(BackedUp),

        _ => None,
    }
}

/// Apply `event` to `snapshot` in memory and return the new state
pub fn transition(snapshot: &mut SnapshotRecord, event: SnapshotEvent) -> Result<SnapshotState> {
    let next = next_state(snapshot.state, event).ok_or(Error::InvalidTransition {
        state: snapshot.state,
        event,
    })?;
    snapshot.state = next;
    Ok(next)
}
