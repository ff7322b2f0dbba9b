//! # Policy Domains
//!
//! Rules are grouped by the backend that knows how to apply them. GPOs may
//! carry domains this build has no applier for; those are merged like any
//! other and simply never dispatched, so domain keys stay plain strings in
//! rule maps. [`PolicyDomain`] names the domains gpol dispatches.

use std::fmt;

/// Policy domains with a dedicated applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyDomain {
    /// Desktop configuration database (dconf) settings.
    Dconf,
    /// Privilege escalation rules (sudoers, polkit).
    Privilege,
    /// Login manager (GDM) settings. Depends on the machine dconf database.
    Gdm,
}

impl PolicyDomain {
    /// Every dispatched domain, in dispatch declaration order.
    pub fn all() -> &'static [PolicyDomain] {
        &[Self::Dconf, Self::Privilege, Self::Gdm]
    }

    /// Rule map key for this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dconf => "dconf",
            Self::Privilege => "privilege",
            Self::Gdm => "gdm",
        }
    }

    /// Look up a dispatched domain by its rule map key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|d| d.as_str() == key)
    }

    /// Whether rules of this domain are only applied on entitled devices.
    pub fn requires_entitlement(&self) -> bool {
        matches!(self, Self::Privilege)
    }
}

impl fmt::Display for PolicyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
