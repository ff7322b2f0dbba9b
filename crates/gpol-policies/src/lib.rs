//! # gpol-policies — Policy Application Core
//!
//! Takes the GPOs a directory client resolved for a target, merges them with
//! [`gpol_core::Policies::unique_rules`], and dispatches each domain's rules
//! to its backend applier. Successful cycles are recorded in a per-target
//! cache that backs the inspection surfaces.
//!
//! ## Apply Cycle
//!
//! ```text
//!   Policies ──merge──▶ RuleMap ─┬─▶ desktop (dconf) ──▶ login manager (gdm, machine only)
//!                               └─▶ entitlement check ──▶ privilege (filtered)
//!                                                   │
//!                        all succeeded ─────────────┴──▶ cache write
//! ```
//!
//! Backends run concurrently on the tokio runtime ([`TaskGraph`]). Any
//! failure fails the whole cycle and leaves the previous cache entry in
//! place.
//!
//! ## Caller Contract
//!
//! The cache has no internal locking: callers must serialize
//! [`Manager::apply_policies`] calls for the same target name.

pub mod applier;
pub mod cache;
pub mod config;
pub mod context;
pub mod entitlement;
pub mod error;
pub mod graph;
pub mod inspect;
pub mod manager;

pub use applier::PolicyApplier;
pub use cache::CacheStore;
pub use config::ManagerConfig;
pub use context::{ApplyContext, CancelToken};
pub use entitlement::{EntitlementGate, StaticStatus, StatusSource};
pub use error::{BackendError, CacheError, ConfigError, PolicyError};
pub use graph::{TaskFailure, TaskGraph, TaskId};
pub use inspect::Inspector;
pub use manager::{Manager, ManagerBuilder};
