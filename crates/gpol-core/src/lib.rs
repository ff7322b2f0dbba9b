#![deny(missing_docs)]

//! # gpol-core — Foundational Types for gpol
//!
//! This crate defines the policy data model every other gpol crate depends
//! on, together with the merge engine that turns an ordered list of GPOs into
//! one conflict-free rule set per policy domain. It performs no I/O beyond
//! writing reports into a caller-provided writer; only `serde` and
//! `thiserror` come from the external ecosystem.
//!
//! ## Precedence Model
//!
//! A [`Policies`] value holds GPOs in closest-first order: index 0 is the GPO
//! linked nearest to the target and wins every conflict. The merge engine
//! ([`Policies::unique_rules`]) walks that list once and emits, for each
//! domain, exactly one [`Entry`] per key in ascending key order. See the
//! `policies` module for the override/append rules.

pub mod domain;
pub mod entry;
pub mod error;
pub mod gpo;
pub mod policies;
pub mod target;

// Re-export primary types at crate root for ergonomic imports.
pub use domain::PolicyDomain;
pub use entry::{Entry, Strategy};
pub use error::ValidationError;
pub use gpo::{Gpo, SeenRules};
pub use policies::{AuxiliaryData, Policies, RuleMap};
pub use target::validate_target_name;
