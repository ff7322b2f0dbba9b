//! # Policy Cache Store
//!
//! One YAML file per target name under the policies cache directory, holding
//! the GPO list of the last successfully applied [`Policies`]. The file's
//! modification time is the target's "last update".
//!
//! ## Layout and Permissions
//!
//! ```text
//! <cache_dir>/policies/          (0700)
//!     ws-042                     (0600)  machine policies
//!     alice@EXAMPLE.COM          (0600)  user policies
//! ```
//!
//! Writes go to a uniquely named hidden temporary file that is synced and
//! renamed over the entry, so readers see either the previous or the new
//! policy set, never a partial one. Target names are validated before they
//! become file names, and they can never start with a dot, so temporary
//! files never shadow an entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gpol_core::{validate_target_name, Policies};
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Directory of per-target cached policy sets.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open the store rooted at `dir`, creating it (mode 0700) if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir)?;
        Ok(Self { dir })
    }

    /// Open an existing store at `dir` without creating anything.
    pub fn open_existing(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        if !fs::metadata(&dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", dir.display()),
            ));
        }
        Ok(Self { dir })
    }

    /// Directory holding the cache entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `target`.
    pub fn path_for(&self, target: &str) -> Result<PathBuf, CacheError> {
        validate_target_name(target)?;
        Ok(self.dir.join(target))
    }

    /// Load the cached policy set of `target`.
    pub fn load(&self, target: &str) -> Result<Policies, CacheError> {
        read_policies(&self.path_for(target)?)
    }

    /// Record `policies` as the applied set of `target`.
    pub fn save(&self, target: &str, policies: &Policies) -> Result<(), CacheError> {
        let path = self.path_for(target)?;
        let data = serde_yaml::to_string(policies).map_err(CacheError::Encode)?;

        atomic_write(&self.dir, &path, data.as_bytes()).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(target_name = target, path = %path.display(), "policies cached");
        Ok(())
    }

    /// Last time `target`'s entry was written.
    pub fn modified(&self, target: &str) -> Result<DateTime<Utc>, CacheError> {
        let path = self.path_for(target)?;
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map_err(|source| io_error(&path, source))?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

/// Read a serialized policy set from any file (cache entry or export).
pub fn read_policies(path: &Path) -> Result<Policies, CacheError> {
    let data = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    serde_yaml::from_str(&data).map_err(|source| CacheError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn io_error(path: &Path, source: io::Error) -> CacheError {
    if source.kind() == io::ErrorKind::NotFound {
        CacheError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Write `data` to `path` through a temporary file in `dir`, then make the
/// rename durable. Temporary files are created 0600 with a hidden name and
/// removed if anything fails before the rename.
fn atomic_write(dir: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    fsync_directory(dir)
}

#[cfg(unix)]
fn fsync_directory(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}
