//! Shared mock collaborators for the apply-cycle tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use gpol_core::{Entry, Gpo, Policies, Strategy};
use gpol_policies::entitlement::StatusError;
use gpol_policies::{
    ApplyContext, BackendError, Manager, ManagerBuilder, ManagerConfig, PolicyApplier,
    StatusSource,
};

pub const MACHINE: &str = "ws-042";

/// One `apply_policy` invocation as seen by a backend.
#[derive(Debug, Clone)]
pub struct Call {
    pub target: String,
    pub is_machine: bool,
    pub rules: Vec<Entry>,
}

/// How a [`RecordingApplier`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Block until the cycle is cancelled, then report it.
    WaitForCancel,
}

/// Applier that records its calls and the global completion order.
pub struct RecordingApplier {
    name: &'static str,
    behavior: Mutex<Behavior>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl RecordingApplier {
    pub fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Self::with_delay(name, journal, Duration::ZERO)
    }

    pub fn with_delay(
        name: &'static str,
        journal: &Arc<Mutex<Vec<String>>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior: Mutex::new(Behavior::Succeed),
            delay,
            calls: Mutex::new(Vec::new()),
            journal: Arc::clone(journal),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn last_rules(&self) -> Vec<Entry> {
        self.calls
            .lock()
            .last()
            .map(|c| c.rules.clone())
            .expect("applier was invoked")
    }
}

#[async_trait]
impl PolicyApplier for RecordingApplier {
    fn name(&self) -> &str {
        self.name
    }

    async fn apply_policy(
        &self,
        ctx: &ApplyContext,
        target: &str,
        is_machine: bool,
        rules: Vec<Entry>,
    ) -> Result<(), BackendError> {
        self.calls.lock().push(Call {
            target: target.to_string(),
            is_machine,
            rules,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let behavior = *self.behavior.lock();
        let result = match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(BackendError::Failed(format!("{} refused the rules", self.name))),
            Behavior::WaitForCancel => {
                ctx.cancelled().await;
                Err(BackendError::Cancelled)
            }
        };
        self.journal.lock().push(format!("{}:done", self.name));
        result
    }
}

/// Status source whose answer can be flipped between cycles, or scripted
/// query by query.
pub struct ToggleStatus {
    value: Mutex<Result<Value, String>>,
    script: Mutex<VecDeque<bool>>,
}

impl ToggleStatus {
    pub fn new(enabled: bool) -> Arc<Self> {
        let status = Arc::new(Self {
            value: Mutex::new(Ok(Value::Null)),
            script: Mutex::new(VecDeque::new()),
        });
        status.set_enabled(enabled);
        status
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.value.lock() = Ok(status_value(enabled));
    }

    pub fn set_unavailable(&self) {
        *self.value.lock() = Err("bus closed".to_string());
    }

    /// Answer the next queries with `answers`, in order, before falling
    /// back to the fixed value.
    pub fn script(&self, answers: impl IntoIterator<Item = bool>) {
        self.script.lock().extend(answers);
    }
}

fn status_value(enabled: bool) -> Value {
    let value = if enabled { "enabled" } else { "disabled" };
    Value::String(value.to_string())
}

#[async_trait]
impl StatusSource for ToggleStatus {
    async fn status(&self) -> Result<Value, StatusError> {
        if let Some(enabled) = self.script.lock().pop_front() {
            return Ok(status_value(enabled));
        }
        self.value.lock().clone().map_err(StatusError::Unavailable)
    }
}

/// A manager wired to recording mocks over a temporary cache.
pub struct Harness {
    pub manager: Manager,
    pub desktop: Arc<RecordingApplier>,
    pub privilege: Arc<RecordingApplier>,
    pub login_manager: Arc<RecordingApplier>,
    pub status: Arc<ToggleStatus>,
    pub journal: Arc<Mutex<Vec<String>>>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(entitled: bool) -> Self {
        Self::with_desktop_delay(entitled, Duration::ZERO)
    }

    pub fn with_desktop_delay(entitled: bool, delay: Duration) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal: Arc<Mutex<Vec<String>>> = Arc::default();
        let desktop = RecordingApplier::with_delay("dconf", &journal, delay);
        let privilege = RecordingApplier::new("privilege", &journal);
        let login_manager = RecordingApplier::new("gdm", &journal);
        let status = ToggleStatus::new(entitled);

        let config = ManagerConfig {
            cache_dir: dir.path().to_path_buf(),
            machine_name: Some(MACHINE.to_string()),
            ..ManagerConfig::default()
        };
        let manager = ManagerBuilder::new(config)
            .with_desktop_applier(desktop.clone())
            .with_privilege_applier(privilege.clone())
            .with_login_manager_applier(login_manager.clone())
            .with_status_source(status.clone())
            .build()
            .expect("manager builds");

        Self {
            manager,
            desktop,
            privilege,
            login_manager,
            status,
            journal,
            dir,
        }
    }

    pub fn cache_file(&self, target: &str) -> std::path::PathBuf {
        self.dir.path().join("policies").join(target)
    }
}

/// A policy set touching every dispatched domain.
pub fn sample_policies() -> Policies {
    Policies::new(vec![
        Gpo::new("{C2B1}", "Developers")
            .with_rules(
                "dconf",
                vec![
                    Entry::new("org/gnome/desktop/interface/clock-format", "'24h'"),
                    Entry::new("org/gnome/shell/favorite-apps", "code.desktop")
                        .with_strategy(Strategy::Append),
                ],
            )
            .with_rules("privilege", vec![Entry::new("allow-local-admins", "true")]),
        Gpo::new("{31B2}", "Default Domain Policy")
            .with_rules(
                "dconf",
                vec![Entry::new("org/gnome/shell/favorite-apps", "firefox.desktop")
                    .with_strategy(Strategy::Append)],
            )
            .with_rules("gdm", vec![Entry::new("banner-message-enable", "true")]),
    ])
}
