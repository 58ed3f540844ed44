//! Strategy selection by capability priority

use super::{DefaultSnapshotStrategy, RbdSnapshotStrategy, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::locks::SnapshotLocks;
use crate::types::{SnapshotId, SnapshotOperation, SnapshotRecord, StrategyPriority};
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered set of strategies, fixed at construction
pub struct StrategyDispatcher {
    ctx: Arc<StrategyContext>,
    strategies: Vec<Strategy>,
    locks: SnapshotLocks,
}

impl StrategyDispatcher {
    pub fn new(ctx: Arc<StrategyContext>, strategies: Vec<Strategy>, locks: SnapshotLocks) -> Self {
        Self {
            ctx,
            strategies,
            locks,
        }
    }

    /// Dispatcher with the built-in strategies: RBD first, then the fallback
    pub fn with_default_strategies(ctx: Arc<StrategyContext>, locks: SnapshotLocks) -> Self {
        let strategies = vec![
            Strategy::Rbd(RbdSnapshotStrategy::new(Arc::clone(&ctx))),
            Strategy::Default(DefaultSnapshotStrategy::new(Arc::clone(&ctx))),
        ];
        Self::new(ctx, strategies, locks)
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Priority each registered strategy reports, in registration order
    pub fn priorities(
        &self,
        snapshot: &SnapshotRecord,
        operation: SnapshotOperation,
    ) -> Result<Vec<(&'static str, StrategyPriority)>> {
        self.strategies
            .iter()
            .map(|s| -> Result<(&'static str, StrategyPriority)> {
                Ok((s.name(), s.can_handle(snapshot, operation)?))
            })
            .collect()
    }

    /// Pick the strategy with the highest priority; ties go to the first registered
    pub fn select(
        &self,
        snapshot: &SnapshotRecord,
        operation: SnapshotOperation,
    ) -> Result<&Strategy> {
        let mut best: Option<(&Strategy, StrategyPriority)> = None;

        for strategy in &self.strategies {
            let priority = strategy.can_handle(snapshot, operation)?;
            debug!(
                snapshot = %snapshot.id,
                %operation,
                strategy = strategy.name(),
                %priority,
                "strategy probed"
            );
            if priority == StrategyPriority::CantHandle {
                continue;
            }
            if best.map_or(true, |(_, current)| priority > current) {
                best = Some((strategy, priority));
            }
        }

        best.map(|(strategy, _)| strategy)
            .ok_or(Error::NoStrategyAvailable {
                snapshot: snapshot.id,
                operation,
            })
    }

    /// Run `operation` on a snapshot while holding its lock
    pub fn execute(&self, id: SnapshotId, operation: SnapshotOperation) -> Result<bool> {
        let _guard = self.locks.acquire(id)?;

        let snapshot = self.ctx.load_snapshot(id)?;
        let strategy = self.select(&snapshot, operation)?;
        info!(snapshot = %id, %operation, strategy = strategy.name(), "dispatching snapshot operation");

        match operation {
            SnapshotOperation::Delete => strategy.delete_snapshot(id),
            SnapshotOperation::Revert => strategy.revert_snapshot(&snapshot),
            SnapshotOperation::Backup => strategy.backup_snapshot(id),
        }
    }
}
