//! # gpol-cli — Policy Inspection CLI
//!
//! Provides the `gpol` command-line interface over the policy cache of a
//! host. It never applies policies itself: applying needs the backends and
//! the directory client, which live in the agent.
//!
//! ## Subcommands
//!
//! - `gpol rules` — Merge a policy file and print the resulting rules.
//! - `gpol applied` — Report the cached policies applying to a target.
//! - `gpol last-update` — Print when a target's policies were last applied.
//!
//! ```bash
//! gpol applied alice@EXAMPLE.COM --details
//! gpol last-update --machine
//! gpol rules /var/cache/gpol/policies/ws-042 --domain dconf
//! ```

pub mod inspect;
pub mod rules;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gpol_policies::ManagerConfig;

/// Configuration file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gpol/gpol.yaml";

/// Build the effective configuration: file values, then command-line
/// overrides.
pub fn load_config(
    config: Option<&Path>,
    cache_dir: Option<PathBuf>,
    machine_name: Option<String>,
) -> Result<ManagerConfig> {
    let mut resolved = match config {
        Some(path) => ManagerConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration: {}", path.display()))?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                ManagerConfig::from_yaml_file(default)
                    .with_context(|| format!("failed to load configuration: {}", default.display()))?
            } else {
                ManagerConfig::default()
            }
        }
    };

    if let Some(dir) = cache_dir {
        resolved.cache_dir = dir;
    }
    if let Some(name) = machine_name {
        resolved.machine_name = Some(name);
    }
    tracing::debug!(cache_dir = %resolved.cache_dir.display(), "configuration resolved");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gpol.yaml");
        std::fs::write(&path, "cache_dir: /srv/gpol\nmachine_name: ws-001\n").unwrap();

        let config = load_config(Some(&path), None, Some("ws-042".into())).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/srv/gpol"));
        assert_eq!(config.machine_name.as_deref(), Some("ws-042"));

        let config = load_config(Some(&path), Some(tmp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.cache_dir, tmp.path());
        assert_eq!(config.machine_name.as_deref(), Some("ws-001"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(Some(&tmp.path().join("nope.yaml")), None, None).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load configuration"));
    }
}
