//! Core types for snapshot lifecycle management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name)
                    .map_err(|_| format!("Invalid {} '{}'. Must be a non-negative integer", stringify!($name), s))
            }
        }
    };
}

id_type!(
    /// Identity of a snapshot
    SnapshotId
);
id_type!(
    /// Identity of the volume a snapshot was taken from
    VolumeId
);
id_type!(
    /// Identity of a primary storage pool
    PoolId
);
id_type!(
    /// Identity of a store-reference record
    StoreRefId
);

/// Lifecycle state of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotState {
    Allocated,
    CreatedOnPrimary,
    BackingUp,
    BackedUp,
    Destroying,
    Destroyed,
    Error,
}

impl SnapshotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotState::Allocated => "Allocated",
            SnapshotState::CreatedOnPrimary => "CreatedOnPrimary",
            SnapshotState::BackingUp => "BackingUp",
            SnapshotState::BackedUp => "BackedUp",
            SnapshotState::Destroying => "Destroying",
            SnapshotState::Destroyed => "Destroyed",
            SnapshotState::Error => "Error",
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events fed to the snapshot state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotEvent {
    BackupRequested,
    DestroyRequested,
    RevertRequested,
    OperationSucceeded,
    OperationFailed,
}

impl SnapshotEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotEvent::BackupRequested => "BackupRequested",
            SnapshotEvent::DestroyRequested => "DestroyRequested",
            SnapshotEvent::RevertRequested => "RevertRequested",
            SnapshotEvent::OperationSucceeded => "OperationSucceeded",
            SnapshotEvent::OperationFailed => "OperationFailed",
        }
    }
}

impl fmt::Display for SnapshotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which tier a physical snapshot copy lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataStoreRole {
    Primary,
    Image,
}

impl fmt::Display for DataStoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataStoreRole::Primary => write!(f, "primary"),
            DataStoreRole::Image => write!(f, "image"),
        }
    }
}

/// Disk image format of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    Raw,
    Qcow2,
    Vhd,
    Vmdk,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Raw => write!(f, "RAW"),
            ImageFormat::Qcow2 => write!(f, "QCOW2"),
            ImageFormat::Vhd => write!(f, "VHD"),
            ImageFormat::Vmdk => write!(f, "VMDK"),
        }
    }
}

/// Backend family of a primary storage pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    Rbd,
    NetworkFilesystem,
    Filesystem,
    Lvm,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolType::Rbd => write!(f, "RBD"),
            PoolType::NetworkFilesystem => write!(f, "NetworkFilesystem"),
            PoolType::Filesystem => write!(f, "Filesystem"),
            PoolType::Lvm => write!(f, "LVM"),
        }
    }
}

/// Operation a caller wants to perform on a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotOperation {
    Backup,
    Delete,
    Revert,
}

impl SnapshotOperation {
    pub const ALL: [SnapshotOperation; 3] = [
        SnapshotOperation::Backup,
        SnapshotOperation::Delete,
        SnapshotOperation::Revert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotOperation::Backup => "backup",
            SnapshotOperation::Delete => "delete",
            SnapshotOperation::Revert => "revert",
        }
    }
}

impl fmt::Display for SnapshotOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SnapshotOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backup" => Ok(SnapshotOperation::Backup),
            "delete" => Ok(SnapshotOperation::Delete),
            "revert" => Ok(SnapshotOperation::Revert),
            _ => Err(format!(
                "Invalid operation '{}'. Must be backup, delete, or revert",
                s
            )),
        }
    }
}

/// How strongly a strategy claims an operation; `CantHandle` is never selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyPriority {
    CantHandle,
    Default,
    Hypervisor,
    Plugin,
    Highest,
}

impl fmt::Display for StrategyPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyPriority::CantHandle => "CANT_HANDLE",
            StrategyPriority::Default => "DEFAULT",
            StrategyPriority::Hypervisor => "HYPERVISOR",
            StrategyPriority::Plugin => "PLUGIN",
            StrategyPriority::Highest => "HIGHEST",
        };
        write!(f, "{}", name)
    }
}

/// Logical snapshot record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: SnapshotId,
    pub volume_id: VolumeId,
    pub name: String,
    pub state: SnapshotState,
    #[serde(default)]
    pub removed: bool,
}

/// Volume as seen by this crate (read-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub id: VolumeId,
    pub name: String,
    pub format: ImageFormat,
    /// Image name of the volume on its pool (e.g. the RBD image)
    pub path: String,
    #[serde(default)]
    pub removed: bool,
}

/// Primary storage pool (read-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePool {
    pub id: PoolId,
    pub name: String,
    pub pool_type: PoolType,
    /// Backend-side pool name (e.g. the Ceph pool)
    pub source: String,
}

/// Links a snapshot to one physical copy on one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRef {
    pub id: StoreRefId,
    pub snapshot_id: SnapshotId,
    pub role: DataStoreRole,
    /// Pool id for `Primary`, image store id for `Image`
    pub store_id: u64,
    /// `image@snap` on a primary pool, relative file path on the image store
    pub install_path: String,
}
