//! # Policy Manager
//!
//! Entry point of an apply cycle. The manager owns the backend appliers, the
//! entitlement gate, and the policy cache, and wires them into a
//! [`TaskGraph`] per call:
//!
//! ```text
//!   desktop ──────────▶ login manager   (machine scope only)
//!   entitlement ──────▶ privilege       (filtered by this cycle's answer)
//! ```
//!
//! The cache is written only once every started task succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gpol_core::{validate_target_name, Entry, Policies, PolicyDomain, RuleMap};
use tokio::sync::oneshot;

use crate::applier::PolicyApplier;
use crate::cache::CacheStore;
use crate::config::ManagerConfig;
use crate::context::ApplyContext;
use crate::entitlement::{filter_rules, EntitlementGate, StatusSource};
use crate::error::{BackendError, ConfigError, PolicyError};
use crate::graph::{TaskFailure, TaskGraph};
use crate::inspect::Inspector;

const ENTITLEMENT_TASK: &str = "entitlement";

/// Applies merged policies to their backends and records what was applied.
pub struct Manager {
    cache: CacheStore,
    inspector: Inspector,
    desktop: Arc<dyn PolicyApplier>,
    privilege: Arc<dyn PolicyApplier>,
    login_manager: Arc<dyn PolicyApplier>,
    entitlement: Arc<EntitlementGate>,
}

/// Assembles a [`Manager`] from its configuration and collaborators.
pub struct ManagerBuilder {
    config: ManagerConfig,
    desktop: Option<Arc<dyn PolicyApplier>>,
    privilege: Option<Arc<dyn PolicyApplier>>,
    login_manager: Option<Arc<dyn PolicyApplier>>,
    status: Option<Arc<dyn StatusSource>>,
}

impl ManagerBuilder {
    /// Start from `config` with no collaborators.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            desktop: None,
            privilege: None,
            login_manager: None,
            status: None,
        }
    }

    /// Backend for the `dconf` domain.
    pub fn with_desktop_applier(mut self, applier: Arc<dyn PolicyApplier>) -> Self {
        self.desktop = Some(applier);
        self
    }

    /// Backend for the `privilege` domain.
    pub fn with_privilege_applier(mut self, applier: Arc<dyn PolicyApplier>) -> Self {
        self.privilege = Some(applier);
        self
    }

    /// Backend for the `gdm` domain.
    pub fn with_login_manager_applier(mut self, applier: Arc<dyn PolicyApplier>) -> Self {
        self.login_manager = Some(applier);
        self
    }

    /// Source of the subscription status used by the entitlement gate.
    pub fn with_status_source(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.status = Some(source);
        self
    }

    /// Create the cache directory, resolve the machine identity, and build
    /// the manager.
    pub fn build(self) -> Result<Manager, PolicyError> {
        let desktop = self.desktop.ok_or(ConfigError::Missing("desktop applier"))?;
        let privilege = self
            .privilege
            .ok_or(ConfigError::Missing("privilege applier"))?;
        let login_manager = self
            .login_manager
            .ok_or(ConfigError::Missing("login manager applier"))?;
        let status = self
            .status
            .ok_or(ConfigError::Missing("entitlement status source"))?;

        let dir = self.config.policies_cache_dir();
        let cache = CacheStore::open(&dir)
            .map_err(|source| ConfigError::CacheDir { path: dir, source })?;
        let machine_name = self.config.resolve_machine_name()?;
        tracing::debug!(
            machine = %machine_name,
            cache_dir = %cache.dir().display(),
            "policy manager ready"
        );

        Ok(Manager {
            inspector: Inspector::new(cache.clone(), machine_name),
            cache,
            desktop,
            privilege,
            login_manager,
            entitlement: Arc::new(EntitlementGate::new(
                status,
                self.config.entitlement_timeout(),
            )),
        })
    }
}

impl Manager {
    /// Apply `policies` for `target` and cache them on success.
    ///
    /// Every started backend is awaited before returning, even after a
    /// failure. On failure the previous cache entry is left untouched.
    /// Calls for the same target must not overlap.
    pub async fn apply_policies(
        &self,
        ctx: &ApplyContext,
        target: &str,
        is_machine: bool,
        policies: &Policies,
    ) -> Result<(), PolicyError> {
        validate_target_name(target)?;
        tracing::info!(target_name = target, is_machine, "applying policies");

        if ctx.is_cancelled() {
            return Err(PolicyError::Cancelled {
                target: target.to_string(),
            });
        }

        let mut rules = policies.unique_rules();
        let gated: RuleMap = PolicyDomain::all()
            .iter()
            .filter(|d| d.requires_entitlement())
            .filter_map(|d| rules.remove_entry(d.as_str()))
            .collect();
        let desktop_rules = take_domain(&mut rules, PolicyDomain::Dconf);
        let login_manager_rules = take_domain(&mut rules, PolicyDomain::Gdm);
        for domain in rules.keys() {
            tracing::debug!(target_name = target, domain = %domain, "no backend for domain; skipping");
        }

        let mut graph: TaskGraph<BackendError> = TaskGraph::new();

        let desktop = graph.spawn(
            self.desktop.name(),
            dispatch(&self.desktop, ctx, target, is_machine, desktop_rules),
        );
        if is_machine {
            graph.spawn_after(
                desktop,
                self.login_manager.name(),
                dispatch(&self.login_manager, ctx, target, is_machine, login_manager_rules),
            );
        }

        let (entitled_tx, entitled_rx) = oneshot::channel();
        let checked = graph.spawn(ENTITLEMENT_TASK, {
            let gate = Arc::clone(&self.entitlement);
            let ctx = ctx.clone();
            async move {
                // The privilege task only starts after this one succeeded,
                // so the receiver is still alive.
                let _ = entitled_tx.send(gate.refresh(&ctx).await);
                Ok(())
            }
        });
        graph.spawn_after(checked, self.privilege.name(), {
            let applier = Arc::clone(&self.privilege);
            let ctx = ctx.clone();
            let target = target.to_string();
            let mut gated = gated;
            async move {
                if !entitled_rx.await.unwrap_or(false) {
                    filter_rules(&mut gated);
                }
                let rules = take_domain(&mut gated, PolicyDomain::Privilege);
                applier.apply_policy(&ctx, &target, is_machine, rules).await
            }
        });

        graph.run().await.map_err(|failure| {
            let err = match failure {
                TaskFailure::Failed { task, error } => PolicyError::Backend {
                    target: target.to_string(),
                    backend: task,
                    source: error,
                },
                TaskFailure::Panicked { task } => PolicyError::Backend {
                    target: target.to_string(),
                    backend: task,
                    source: BackendError::Aborted,
                },
            };
            tracing::warn!(target_name = target, error = %err, "policy application failed");
            err
        })?;

        self.cache.save(target, policies).map_err(|source| PolicyError::Persistence {
            target: target.to_string(),
            source,
        })?;
        tracing::info!(target_name = target, "policies applied");
        Ok(())
    }

    /// Entitlement state observed by the last apply cycle.
    pub fn status(&self) -> bool {
        self.entitlement.current()
    }

    /// The local machine identity.
    pub fn machine_name(&self) -> &str {
        self.inspector.machine_name()
    }

    /// See [`Inspector::load_cached`].
    pub fn load_cached(&self, target: &str) -> Result<Policies, PolicyError> {
        self.inspector.load_cached(target)
    }

    /// See [`Inspector::dump_policies`].
    pub fn dump_policies(
        &self,
        target: &str,
        with_rules: bool,
        with_overridden: bool,
    ) -> Result<String, PolicyError> {
        self.inspector.dump_policies(target, with_rules, with_overridden)
    }

    /// See [`Inspector::last_update_for`].
    pub fn last_update_for(
        &self,
        target: &str,
        is_machine: bool,
    ) -> Result<DateTime<Utc>, PolicyError> {
        self.inspector.last_update_for(target, is_machine)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("cache", &self.cache)
            .field("machine_name", &self.inspector.machine_name())
            .field("desktop", &self.desktop.name())
            .field("privilege", &self.privilege.name())
            .field("login_manager", &self.login_manager.name())
            .field("entitlement", &self.entitlement)
            .finish()
    }
}

fn take_domain(rules: &mut RuleMap, domain: PolicyDomain) -> Vec<Entry> {
    rules.remove(domain.as_str()).unwrap_or_default()
}

fn dispatch(
    applier: &Arc<dyn PolicyApplier>,
    ctx: &ApplyContext,
    target: &str,
    is_machine: bool,
    rules: Vec<Entry>,
) -> impl std::future::Future<Output = Result<(), BackendError>> + Send + 'static {
    let applier = Arc::clone(applier);
    let ctx = ctx.clone();
    let target = target.to_string();
    async move { applier.apply_policy(&ctx, &target, is_machine, rules).await }
}
