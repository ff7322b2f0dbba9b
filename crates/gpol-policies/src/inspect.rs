//! # Cached State Inspection
//!
//! Read-only views over the policy cache: the last applied policy set of a
//! target, a human-readable report of what applies to it, and when it was
//! last updated.
//!
//! A user target's report is layered over the machine's: machine GPOs are
//! rendered first and user rules already set at machine scope are then
//! shown as overridden.

use chrono::{DateTime, Utc};
use gpol_core::{Policies, SeenRules};

use crate::cache::CacheStore;
use crate::error::PolicyError;

/// Header preceding the machine scope section of a user report.
pub const MACHINE_SECTION_HEADER: &str = "Policies from machine configuration:";

/// Header preceding the user scope section of a user report.
pub const USER_SECTION_HEADER: &str = "Policies from user configuration:";

/// Read side of the policy cache, bound to the local machine identity.
#[derive(Debug, Clone)]
pub struct Inspector {
    cache: CacheStore,
    machine_name: String,
}

impl Inspector {
    /// Create an inspector over `cache` for the machine `machine_name`.
    pub fn new(cache: CacheStore, machine_name: impl Into<String>) -> Self {
        Self {
            cache,
            machine_name: machine_name.into(),
        }
    }

    /// The local machine identity.
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Last successfully applied policy set of `target`.
    pub fn load_cached(&self, target: &str) -> Result<Policies, PolicyError> {
        self.cache
            .load(target)
            .map_err(|e| PolicyError::from_cache(target, e))
    }

    /// Render the cached policies applying to `target`.
    ///
    /// `with_rules` includes each GPO's rules instead of only its header;
    /// `with_overridden` also lists rules hidden by a closer GPO.
    pub fn dump_policies(
        &self,
        target: &str,
        with_rules: bool,
        with_overridden: bool,
    ) -> Result<String, PolicyError> {
        tracing::info!(target_name = target, "dumping policies");

        let mut out = String::new();
        let mut seen = SeenRules::new();

        if target != self.machine_name {
            let machine = self.load_cached(&self.machine_name)?;
            push_line(&mut out, MACHINE_SECTION_HEADER);
            render(&mut out, &machine, with_rules, with_overridden, &mut seen);
            push_line(&mut out, USER_SECTION_HEADER);
        }

        let policies = self.load_cached(target)?;
        render(&mut out, &policies, with_rules, with_overridden, &mut seen);
        Ok(out)
    }

    /// Time `target`'s policies were last applied. For machine scope the
    /// name is ignored and the local machine identity is used.
    pub fn last_update_for(
        &self,
        target: &str,
        is_machine: bool,
    ) -> Result<DateTime<Utc>, PolicyError> {
        let target = if is_machine {
            self.machine_name.as_str()
        } else {
            target
        };
        tracing::info!(target_name = target, "getting last update time");

        self.cache
            .modified(target)
            .map_err(|e| PolicyError::from_cache(target, e))
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn render(
    out: &mut String,
    policies: &Policies,
    with_rules: bool,
    with_overridden: bool,
    seen: &mut SeenRules,
) {
    for gpo in &policies.gpos {
        // Writing into a String cannot fail.
        let _ = gpo.format(out, with_rules, with_overridden, seen);
    }
}
