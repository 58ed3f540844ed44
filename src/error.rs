//! Error types for snapshot-lifecycle

use crate::types::{
    DataStoreRole, ImageFormat, PoolId, PoolType, SnapshotEvent, SnapshotId, SnapshotOperation,
    SnapshotState, VolumeId,
};
use thiserror::Error;

/// Result type alias for snapshot-lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during snapshot-lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("No transition from state {state} on event {event}")]
    InvalidTransition {
        state: SnapshotState,
        event: SnapshotEvent,
    },

    #[error("No strategy can {operation} snapshot {snapshot}")]
    NoStrategyAvailable {
        snapshot: SnapshotId,
        operation: SnapshotOperation,
    },

    #[error("Volume {volume} has format {format}; only RAW can be reverted on this backend")]
    UnsupportedFormat { volume: VolumeId, format: ImageFormat },

    #[error("Tier unreachable: {0}")]
    TierUnreachable(String),

    #[error("Snapshot {snapshot} is in an ambiguous tier state: {reason}")]
    AmbiguousTierState { snapshot: SnapshotId, reason: String },

    #[error("Snapshot {0} not found")]
    SnapshotNotFound(SnapshotId),

    #[error("Volume {0} not found")]
    VolumeNotFound(VolumeId),

    #[error("Storage pool {0} not found")]
    PoolNotFound(PoolId),

    #[error("Snapshot {snapshot} has no copy on the {role} tier")]
    NotOnTier {
        snapshot: SnapshotId,
        role: DataStoreRole,
    },

    #[error("Storage pool {pool} of type {pool_type} is not supported by this adapter")]
    UnsupportedPool { pool: PoolId, pool_type: PoolType },

    #[error("GET {url} returned HTTP {status}; expected 2XX")]
    ProbeStatus { url: String, status: u16 },

    #[error("Timed out waiting for the lock on snapshot {0}")]
    LockTimeout(SnapshotId),

    #[error("Command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
