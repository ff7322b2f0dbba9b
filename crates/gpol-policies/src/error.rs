//! # Error Hierarchy
//!
//! [`PolicyError`] is what callers of the [`Manager`](crate::Manager) see.
//! It keeps "policy not applied" ([`PolicyError::Backend`]) distinct from
//! "policy applied but not recorded" ([`PolicyError::Persistence`]) so that
//! callers can decide whether a retry must re-run the backends.
//!
//! Entitlement check failures never appear here: they are logged and
//! treated as "not entitled".

use std::io;
use std::path::PathBuf;

use gpol_core::ValidationError;
use thiserror::Error;

/// Caller-facing errors of the policy manager.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The manager could not be set up.
    #[error("can't create policy manager: {0}")]
    Configuration(#[from] ConfigError),

    /// A backend failed to apply its rules. Nothing was cached.
    #[error("failed to apply policy to {target:?}: {backend}: {source}")]
    Backend {
        /// Target the cycle was for.
        target: String,
        /// Name of the failing backend.
        backend: String,
        /// The backend's own error.
        #[source]
        source: BackendError,
    },

    /// The policy cache could not be read or written.
    #[error("policy cache for {target:?} is unusable: {source}")]
    Persistence {
        /// Target whose cache entry was involved.
        target: String,
        /// Underlying cache failure.
        #[source]
        source: CacheError,
    },

    /// No policy was ever applied for this target.
    #[error("no policy applied for {target:?}: {source}")]
    NotFound {
        /// Target (or machine identity) without a cache entry.
        target: String,
        /// Underlying cache failure.
        #[source]
        source: CacheError,
    },

    /// The cycle was cancelled before any backend was started.
    #[error("policy application for {target:?} was cancelled")]
    Cancelled {
        /// Target the cycle was for.
        target: String,
    },

    /// An input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PolicyError {
    /// Classify a cache failure: a missing entry is `NotFound`, anything
    /// else is a `Persistence` failure.
    pub(crate) fn from_cache(target: &str, source: CacheError) -> Self {
        match source {
            CacheError::NotFound { .. } => Self::NotFound {
                target: target.to_string(),
                source,
            },
            CacheError::Validation(e) => Self::Validation(e),
            _ => Self::Persistence {
                target: target.to_string(),
                source,
            },
        }
    }
}

/// Errors reported by backend appliers.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend rejected or failed to render the rules.
    #[error("{0}")]
    Failed(String),

    /// The backend hit an I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backend observed cancellation and stopped.
    #[error("cancelled")]
    Cancelled,

    /// The backend task ended without returning (it panicked).
    #[error("backend task aborted before completion")]
    Aborted,
}

/// Policy cache failures.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No cache entry exists.
    #[error("no cached policies at {}", .path.display())]
    NotFound {
        /// Expected cache file.
        path: PathBuf,
    },

    /// Reading, writing, or inspecting a cache file failed.
    #[error("can't access {}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A cache file does not hold a valid policy set.
    #[error("can't decode cached policies in {}: {source}", .path.display())]
    Decode {
        /// File involved.
        path: PathBuf,
        /// YAML decoding failure.
        source: serde_yaml::Error,
    },

    /// A policy set could not be serialized.
    #[error("can't encode policies: {0}")]
    Encode(#[source] serde_yaml::Error),

    /// The target name is not usable as a cache file name.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Manager configuration and wiring errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("can't read configuration {}: {source}", .path.display())]
    Read {
        /// Configuration file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// A configuration file is not valid YAML for [`ManagerConfig`](crate::ManagerConfig).
    #[error("can't parse configuration {}: {source}", .path.display())]
    Parse {
        /// Configuration file.
        path: PathBuf,
        /// YAML decoding failure.
        source: serde_yaml::Error,
    },

    /// The policy cache directory could not be created.
    #[error("can't create policy cache directory {}: {source}", .path.display())]
    CacheDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// No machine name was configured and the hostname is unavailable.
    #[error("can't determine the local machine name; set machine_name in the configuration")]
    MachineIdentity,

    /// The configured machine name is unusable.
    #[error("invalid machine name: {0}")]
    MachineName(#[source] ValidationError),

    /// A required collaborator was not provided to the builder.
    #[error("no {0} configured")]
    Missing(&'static str),
}
