//! # Backend Appliers
//!
//! Every backend (desktop configuration, privilege rules, login manager,
//! and any future one) is reached through [`PolicyApplier`] so the manager
//! never depends on a concrete backend type.

use async_trait::async_trait;
use gpol_core::Entry;

use crate::context::ApplyContext;
use crate::error::BackendError;

/// Capability to apply one domain's merged rules to a target.
///
/// Implementations must be `Send + Sync`: the manager shares them across
/// concurrently running tasks behind an `Arc`. `rules` is sorted by key with
/// one entry per key; an empty list means "no policy for this domain" and
/// must reset whatever a previous cycle applied.
#[async_trait]
pub trait PolicyApplier: Send + Sync {
    /// Short backend name used in logs and error messages (e.g. "dconf").
    fn name(&self) -> &str;

    /// Apply `rules` for `target`. `is_machine` selects the machine-wide
    /// configuration instead of the per-user one.
    async fn apply_policy(
        &self,
        ctx: &ApplyContext,
        target: &str,
        is_machine: bool,
        rules: Vec<Entry>,
    ) -> Result<(), BackendError>;
}
