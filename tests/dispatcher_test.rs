mod common;

use common::{FakeBackup, FakePrimary, Fixture, Scenario, SNAPSHOT};
use snapshot_lifecycle::locks::SnapshotLocks;
use snapshot_lifecycle::store::{Catalog, SnapshotStore};
use snapshot_lifecycle::tier::{RbdConfig, RbdPrimaryTier};
use snapshot_lifecycle::strategy::{DefaultSnapshotStrategy, RbdSnapshotStrategy};
use snapshot_lifecycle::{
    DataStoreRole, Error, PoolType, SnapshotId, SnapshotOperation, SnapshotState, Strategy,
    StrategyContext, StrategyDispatcher, StrategyPriority,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use DataStoreRole::{Image, Primary};

fn dispatcher(fixture: &Fixture) -> StrategyDispatcher {
    StrategyDispatcher::with_default_strategies(fixture.ctx.clone(), SnapshotLocks::default())
}

fn fixture(scenario: Scenario) -> Fixture {
    Fixture::new(scenario.build(), FakePrimary::default(), FakeBackup::default())
}

fn selected(fixture: &Fixture, operation: SnapshotOperation) -> Result<&'static str, Error> {
    let dispatcher = dispatcher(fixture);
    let snapshot = fixture.snapshot();
    dispatcher
        .select(&snapshot, operation)
        .map(|strategy| strategy.name())
}

#[test]
fn rbd_strategy_wins_delete_and_revert_on_rbd_pools() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    assert_eq!(selected(&fixture, SnapshotOperation::Delete).unwrap(), "rbd");
    assert_eq!(selected(&fixture, SnapshotOperation::Revert).unwrap(), "rbd");
}

#[test]
fn backup_falls_through_to_default_strategy() {
    let fixture = fixture(Scenario::rbd(SnapshotState::CreatedOnPrimary, &[Primary]));
    assert_eq!(selected(&fixture, SnapshotOperation::Backup).unwrap(), "default");
}

#[test]
fn removed_volume_disqualifies_rbd_strategy() {
    let mut scenario = Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]);
    scenario.volume_removed = true;
    let fixture = fixture(scenario);

    assert_eq!(selected(&fixture, SnapshotOperation::Delete).unwrap(), "default");
    assert!(matches!(
        selected(&fixture, SnapshotOperation::Revert),
        Err(Error::NoStrategyAvailable {
            operation: SnapshotOperation::Revert,
            ..
        })
    ));
}

#[test]
fn non_rbd_pool_cannot_be_reverted() {
    let mut scenario = Scenario::rbd(SnapshotState::BackedUp, &[Primary]);
    scenario.pool_type = PoolType::NetworkFilesystem;
    let fixture = fixture(scenario);

    assert!(matches!(
        selected(&fixture, SnapshotOperation::Revert),
        Err(Error::NoStrategyAvailable { .. })
    ));
    assert_eq!(selected(&fixture, SnapshotOperation::Delete).unwrap(), "default");
}

/// Dispatcher over an in-memory catalog and the real RBD adapter
fn rbd_backed(scenario: Scenario) -> (Arc<Catalog>, StrategyDispatcher) {
    let catalog = Arc::new(Catalog::in_memory(scenario.build()));
    let ctx = Arc::new(StrategyContext {
        snapshots: catalog.clone(),
        volumes: catalog.clone(),
        pools: catalog.clone(),
        primary: Arc::new(RbdPrimaryTier::new(RbdConfig {
            binary: "/nonexistent/rbd".to_string(),
            ..RbdConfig::default()
        })),
        backup: Arc::new(FakeBackup::default()),
    });
    (catalog, StrategyDispatcher::with_default_strategies(ctx, SnapshotLocks::default()))
}

#[test]
fn unsupported_pool_is_not_claimed_for_backup_or_live_delete() {
    let mut scenario = Scenario::rbd(SnapshotState::CreatedOnPrimary, &[Primary]);
    scenario.pool_type = PoolType::NetworkFilesystem;
    let (_, dispatcher) = rbd_backed(scenario);

    for operation in [SnapshotOperation::Backup, SnapshotOperation::Delete] {
        let err = dispatcher.execute(SNAPSHOT, operation).unwrap_err();
        assert!(matches!(err, Error::NoStrategyAvailable { operation: op, .. } if op == operation));
    }
}

#[test]
fn unsupported_pool_still_allows_deleting_error_snapshots() {
    let mut scenario = Scenario::rbd(SnapshotState::Error, &[Primary]);
    scenario.pool_type = PoolType::NetworkFilesystem;
    let (catalog, dispatcher) = rbd_backed(scenario);

    assert!(dispatcher.execute(SNAPSHOT, SnapshotOperation::Delete).unwrap());
    assert!(catalog.find_store_refs(SNAPSHOT).unwrap().is_empty());
}

#[test]
fn primary_adapter_support_gates_fallback_priority() {
    let mut scenario = Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]);
    scenario.pool_type = PoolType::Lvm;
    let fixture = Fixture::new(
        scenario.build(),
        FakePrimary {
            unsupported: vec![PoolType::Lvm],
            ..FakePrimary::default()
        },
        FakeBackup::default(),
    );

    let priorities = dispatcher(&fixture)
        .priorities(&fixture.snapshot(), SnapshotOperation::Backup)
        .unwrap();
    assert_eq!(
        priorities,
        vec![
            ("rbd", StrategyPriority::CantHandle),
            ("default", StrategyPriority::CantHandle)
        ]
    );
}

#[test]
fn no_strategies_means_none_available() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary]));
    let dispatcher = StrategyDispatcher::new(fixture.ctx.clone(), Vec::new(), SnapshotLocks::default());

    let err = dispatcher
        .select(&fixture.snapshot(), SnapshotOperation::Delete)
        .err()
        .unwrap();
    assert!(matches!(err, Error::NoStrategyAvailable { snapshot, .. } if snapshot == SNAPSHOT));
}

#[test]
fn higher_priority_beats_registration_order() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    let dispatcher = StrategyDispatcher::new(
        fixture.ctx.clone(),
        vec![
            Strategy::Default(DefaultSnapshotStrategy::new(fixture.ctx.clone())),
            Strategy::Rbd(RbdSnapshotStrategy::new(fixture.ctx.clone())),
        ],
        SnapshotLocks::default(),
    );

    let strategy = dispatcher
        .select(&fixture.snapshot(), SnapshotOperation::Delete)
        .unwrap();
    assert_eq!(strategy.name(), "rbd");
}

#[test]
fn ties_go_to_the_first_registered_strategy() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    let dispatcher = StrategyDispatcher::new(
        fixture.ctx.clone(),
        vec![
            Strategy::Rbd(RbdSnapshotStrategy::new(fixture.ctx.clone())),
            Strategy::Rbd(RbdSnapshotStrategy::new(fixture.ctx.clone())),
        ],
        SnapshotLocks::default(),
    );

    for _ in 0..10 {
        let strategy = dispatcher
            .select(&fixture.snapshot(), SnapshotOperation::Revert)
            .unwrap();
        assert!(std::ptr::eq(strategy, &dispatcher.strategies()[0]));
    }
}

#[test]
fn priorities_are_reported_in_registration_order() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    let priorities = dispatcher(&fixture)
        .priorities(&fixture.snapshot(), SnapshotOperation::Backup)
        .unwrap();
    assert_eq!(
        priorities,
        vec![
            ("rbd", StrategyPriority::CantHandle),
            ("default", StrategyPriority::Default)
        ]
    );
}

#[test]
fn execute_delete_runs_selected_strategy() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    let dispatcher = dispatcher(&fixture);

    assert!(dispatcher.execute(SNAPSHOT, SnapshotOperation::Delete).unwrap());
    assert_eq!(fixture.backup.calls(), 1);
    assert_eq!(fixture.primary.deletes.load(Ordering::SeqCst), 1);

    // a repeated delete sees the removed record and does nothing
    assert!(dispatcher.execute(SNAPSHOT, SnapshotOperation::Delete).unwrap());
    assert_eq!(fixture.backup.calls(), 1);
}

#[test]
fn execute_backup_then_revert() {
    let fixture = fixture(Scenario::rbd(SnapshotState::CreatedOnPrimary, &[Primary]));
    let dispatcher = dispatcher(&fixture);

    assert!(dispatcher.execute(SNAPSHOT, SnapshotOperation::Backup).unwrap());
    assert!(dispatcher.execute(SNAPSHOT, SnapshotOperation::Revert).unwrap());
    assert_eq!(fixture.primary.exports.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.primary.reverts.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.snapshot().state, SnapshotState::BackedUp);
}

#[test]
fn execute_unknown_snapshot_fails() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary]));
    let err = dispatcher(&fixture)
        .execute(SnapshotId(404), SnapshotOperation::Delete)
        .unwrap_err();
    assert!(matches!(err, Error::SnapshotNotFound(SnapshotId(404))));
}

#[test]
fn concurrent_deletes_of_one_snapshot_are_serialized() {
    let fixture = fixture(Scenario::rbd(SnapshotState::BackedUp, &[Primary, Image]));
    let dispatcher = Arc::new(dispatcher(&fixture));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                let deleted = dispatcher.execute(SNAPSHOT, SnapshotOperation::Delete);
                deleted.unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    // only the first delete touched the tiers
    assert_eq!(fixture.backup.calls(), 1);
    assert_eq!(fixture.primary.deletes.load(Ordering::SeqCst), 1);
}
