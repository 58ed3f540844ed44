//! snapshot-lifecycle: snapshot strategy dispatch and tier reconciliation
//!
//! This library selects a storage-backend strategy for a snapshot operation
//! (delete, revert, backup), drives the snapshot through its lifecycle state
//! machine and reconciles cleanup across the primary pool and the backup
//! image store. A small HA client checks KVM host liveness over HTTP.

pub mod config;
pub mod error;
pub mod ha;
pub mod locks;
pub mod state_machine;
pub mod store;
pub mod strategy;
pub mod tier;
pub mod types;

pub use error::{Error, Result};
pub use strategy::{Strategy, StrategyContext, StrategyDispatcher};
pub use types::{
    DataStoreRole, ImageFormat, PoolId, PoolType, SnapshotEvent, SnapshotId, SnapshotOperation,
    SnapshotRecord, SnapshotState, StoragePool, StoreRef, StoreRefId, StrategyPriority, VolumeId,
    VolumeRecord,
};
