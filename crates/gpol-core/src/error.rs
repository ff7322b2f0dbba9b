//! # Error Types
//!
//! Validation failures for the policy data model, built with `thiserror`.

use thiserror::Error;

/// Validation errors for policy primitives.
///
/// These carry the rejected input so operators can see exactly which value
/// was refused without enabling debug logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A target name cannot be used as a cache file name.
    #[error("invalid target name {name:?}: {reason}")]
    InvalidTargetName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A strategy string is neither `override` nor `append`.
    #[error("unknown rule strategy {0:?} (expected \"override\" or \"append\")")]
    UnknownStrategy(String),
}
