//! Settings loaded from a TOML file with environment overrides

use crate::error::{Error, Result};
use crate::ha::{HaConfig, VirshConfig};
use crate::locks::LockConfig;
use crate::tier::{ImageStoreConfig, RbdConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CATALOG_PATH: &str = "SNAPSHOT_LIFECYCLE_CATALOG";
pub const ENV_IMAGE_STORE_ROOT: &str = "SNAPSHOT_LIFECYCLE_IMAGE_STORE_ROOT";
pub const ENV_RBD_CLIENT_ID: &str = "SNAPSHOT_LIFECYCLE_RBD_CLIENT_ID";
pub const ENV_RBD_MONITOR: &str = "SNAPSHOT_LIFECYCLE_RBD_MONITOR";
pub const ENV_HA_ENABLED: &str = "SNAPSHOT_LIFECYCLE_HA_ENABLED";
pub const ENV_HA_PORT: &str = "SNAPSHOT_LIFECYCLE_HA_PORT";
pub const ENV_HA_MAX_RETRIES: &str = "SNAPSHOT_LIFECYCLE_HA_MAX_RETRIES";
pub const ENV_HA_RETRY_DELAY_MS: &str = "SNAPSHOT_LIFECYCLE_HA_RETRY_DELAY_MS";
pub const ENV_VIRSH_URI: &str = "SNAPSHOT_LIFECYCLE_VIRSH_URI";

pub const DEFAULT_CONFIG_FILE: &str = "/etc/snapshot-lifecycle.toml";

/// Where the snapshot catalog lives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/snapshot-lifecycle/catalog.json"),
        }
    }
}

/// All settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogConfig,
    pub rbd: RbdConfig,
    pub image_store: ImageStoreConfig,
    pub ha: HaConfig,
    pub virsh: VirshConfig,
    pub locks: LockConfig,
}

impl Settings {
    /// Load `path` if given, else the default file if present, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides read through `getter`
    pub fn with_overrides<F>(mut self, mut getter: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(path) = getter(ENV_CATALOG_PATH) {
            self.catalog.path = PathBuf::from(path);
        }
        if let Some(root) = getter(ENV_IMAGE_STORE_ROOT) {
            self.image_store.root = PathBuf::from(root);
        }
        if let Some(id) = getter(ENV_RBD_CLIENT_ID) {
            self.rbd.client_id = id;
        }
        if let Some(monitor) = getter(ENV_RBD_MONITOR) {
            self.rbd.monitor = Some(monitor).filter(|m| !m.trim().is_empty());
        }
        if let Some(enabled) = getter(ENV_HA_ENABLED) {
            self.ha.enabled = parse(ENV_HA_ENABLED, &enabled)?;
        }
        if let Some(port) = getter(ENV_HA_PORT) {
            self.ha.port = Some(parse(ENV_HA_PORT, &port)?);
        }
        if let Some(retries) = getter(ENV_HA_MAX_RETRIES) {
            self.ha.max_retries = parse(ENV_HA_MAX_RETRIES, &retries)?;
        }
        if let Some(delay) = getter(ENV_HA_RETRY_DELAY_MS) {
            self.ha.retry_delay_ms = parse(ENV_HA_RETRY_DELAY_MS, &delay)?;
        }
        if let Some(uri) = getter(ENV_VIRSH_URI) {
            self.virsh.uri = uri;
        }
        Ok(self)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: '{}'", key, value)))
}
