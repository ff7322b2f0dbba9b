//! # Manager Configuration
//!
//! Loaded from a YAML file; every field has a default, so an empty file (or
//! no file at all) yields a usable configuration.
//!
//! ```yaml
//! cache_dir: /var/cache/gpol
//! machine_name: ws-042
//! entitlement_timeout_secs: 5
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gpol_core::validate_target_name;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Subdirectory of `cache_dir` holding the per-target policy entries.
pub const POLICIES_CACHE_BASE_NAME: &str = "policies";

/// Default root of the agent's cache.
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/gpol";

/// Default bound on the entitlement status query.
pub const DEFAULT_ENTITLEMENT_TIMEOUT_SECS: u64 = 5;

const HOSTNAME_SOURCES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];

/// Settings for a [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Root cache directory.
    pub cache_dir: PathBuf,
    /// Local machine identity. Falls back to the kernel hostname.
    pub machine_name: Option<String>,
    /// Upper bound, in seconds, on the entitlement status query.
    pub entitlement_timeout_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            machine_name: None,
            entitlement_timeout_secs: DEFAULT_ENTITLEMENT_TIMEOUT_SECS,
        }
    }
}

impl ManagerConfig {
    /// Read a configuration file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // serde_yaml rejects an empty document for a struct.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Directory of the policy cache entries.
    pub fn policies_cache_dir(&self) -> PathBuf {
        self.cache_dir.join(POLICIES_CACHE_BASE_NAME)
    }

    /// Entitlement query bound as a [`Duration`].
    pub fn entitlement_timeout(&self) -> Duration {
        Duration::from_secs(self.entitlement_timeout_secs)
    }

    /// The local machine identity: the configured name, else the hostname.
    pub fn resolve_machine_name(&self) -> Result<String, ConfigError> {
        let name = match &self.machine_name {
            Some(name) => name.clone(),
            None => local_hostname().ok_or(ConfigError::MachineIdentity)?,
        };
        validate_target_name(&name).map_err(ConfigError::MachineName)?;
        Ok(name)
    }
}

fn local_hostname() -> Option<String> {
    HOSTNAME_SOURCES.iter().find_map(|source| {
        let raw = fs::read_to_string(source).ok()?;
        let name = raw.trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}
