//! # Policy Sets and the Merge Engine
//!
//! A [`Policies`] value is the ordered list of GPOs that apply to one target
//! (a machine or a user), closest GPO first, plus the opaque auxiliary data
//! the directory client downloaded alongside them.
//!
//! ## Merge Rules
//!
//! [`Policies::unique_rules`] walks the GPOs closest-first and keeps one
//! entry per `(domain, key)`:
//!
//! 1. **Override**: the first GPO to set a key wins; farther entries for the
//!    same key are ignored whatever their strategy.
//! 2. **Append**: disabled append entries are skipped without marking the
//!    key as seen. The first enabled entry becomes the value. A farther
//!    enabled append entry is prepended to the accumulated value
//!    (`farther + "\n" + closer`) as long as every closer contribution was
//!    itself an append; an override closes the chain for good. Metadata
//!    always stays the closest contributor's.
//!
//! Each domain's output is sorted by ascending key so backends apply and
//! callers diff rules deterministically.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, Strategy};
use crate::gpo::Gpo;

/// Merged rules: domain to entries sorted by key, one entry per key.
pub type RuleMap = BTreeMap<String, Vec<Entry>>;

// ---------------------------------------------------------------------------
// AuxiliaryData
// ---------------------------------------------------------------------------

/// Opaque data downloaded with the GPOs (scripts, assets, ...).
///
/// Only readable by offset, never serialized: it is tied to the resolution
/// cycle that produced it and is absent from cached policy sets.
#[derive(Clone, Default)]
pub struct AuxiliaryData {
    bytes: Arc<[u8]>,
}

impl AuxiliaryData {
    /// Wrap a byte buffer.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Copy bytes starting at `offset` into `buf`, returning the number of
    /// bytes copied (0 at or past the end).
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        let Some(available) = self.bytes.get(start..) else {
            return 0;
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        n
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there is no data.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AuxiliaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryData")
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// The GPOs applied to one target, closest first.
///
/// Equality compares the GPO list only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policies {
    /// GPOs in precedence order; index 0 wins conflicts.
    #[serde(default)]
    pub gpos: Vec<Gpo>,
    /// Opaque auxiliary data. Excluded from serialization.
    #[serde(skip)]
    pub data: Option<AuxiliaryData>,
}

impl PartialEq for Policies {
    fn eq(&self, other: &Self) -> bool {
        self.gpos == other.gpos
    }
}

impl Policies {
    /// Create a policy set without auxiliary data.
    pub fn new(gpos: Vec<Gpo>) -> Self {
        Self { gpos, data: None }
    }

    /// Attach auxiliary data.
    pub fn with_data(mut self, data: AuxiliaryData) -> Self {
        self.data = Some(data);
        self
    }

    /// Merge every GPO into one rule list per domain.
    ///
    /// Every domain mentioned by any GPO is present in the result, even when
    /// all of its entries were skipped.
    pub fn unique_rules(&self) -> RuleMap {
        let mut dedup: BTreeMap<String, BTreeMap<String, Entry>> = BTreeMap::new();

        for gpo in &self.gpos {
            for (domain, entries) in &gpo.rules {
                let merged = dedup.entry(domain.clone()).or_default();
                for e in entries {
                    let is_append = e.strategy == Strategy::Append;
                    // Only enabled values are appended.
                    if is_append && e.disabled {
                        continue;
                    }
                    match merged.get_mut(&e.key) {
                        None => {
                            merged.insert(e.key.clone(), e.clone());
                        }
                        // A closer GPO appended too: prepend the farther value.
                        Some(closer) if is_append && closer.strategy == Strategy::Append => {
                            closer.value = format!("{}\n{}", e.value, closer.value);
                        }
                        // A closer GPO overrode the key.
                        Some(_) => {}
                    }
                }
            }
        }

        dedup
            .into_iter()
            .map(|(domain, entries)| (domain, entries.into_values().collect()))
            .collect()
    }
}
