//! # Rule Entries
//!
//! The atomic unit of policy. An [`Entry`] is pure data: a key, its value,
//! how it combines with the same key from farther GPOs, whether it is
//! disabled, and free-form provenance metadata.
//!
//! The policy domain an entry belongs to is not stored on the entry itself:
//! entries always live under their domain in a GPO's rule map or in a
//! [`RuleMap`](crate::RuleMap), so the `(domain, key)` pair is carried by
//! position.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How an entry combines with entries for the same key from farther GPOs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// The closest GPO setting the key wins outright.
    #[default]
    Override,
    /// Enabled values from every GPO down the chain are concatenated until
    /// an overriding GPO is reached.
    Append,
}

impl Strategy {
    /// Return the serialized name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Append => "append",
        }
    }

    /// Whether this is the default strategy. Used to keep caches terse.
    pub fn is_override(&self) -> bool {
        *self == Self::Override
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "override" => Ok(Self::Override),
            "append" => Ok(Self::Append),
            other => Err(ValidationError::UnknownStrategy(other.to_string())),
        }
    }
}

/// A single policy rule.
///
/// `(domain, key)` uniqueness is only guaranteed after merging; a raw GPO
/// may legitimately carry several entries that collide with other GPOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Rule key, interpreted by the backend owning the domain.
    pub key: String,
    /// Rule value. Multi-line for merged append chains.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Disabled rules ask the backend to reset the key to its default.
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    /// Provenance metadata (e.g. value type, originating GPO).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub meta: String,
    /// Conflict resolution strategy.
    #[serde(default, skip_serializing_if = "Strategy::is_override")]
    pub strategy: Strategy,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Entry {
    /// Create an enabled override entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            disabled: false,
            meta: String::new(),
            strategy: Strategy::Override,
        }
    }

    /// Set the conflict resolution strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the provenance metadata.
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = meta.into();
        self
    }

    /// Mark the entry as disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}
