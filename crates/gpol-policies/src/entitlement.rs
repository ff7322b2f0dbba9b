//! # Entitlement Gate
//!
//! Some rule domains (currently `privilege`) are only applied on devices
//! with an active subscription. The gate asks a [`StatusSource`] for the
//! subscription status property, caches the answer, and strips gated
//! domains from a rule map when the device is not entitled.
//!
//! ## Fail-Closed
//!
//! A source error, a timeout, cancellation, or a value that is not the
//! string `"enabled"` all mean "not entitled". None of these is an error for
//! the caller: the degraded path is logged at `warn` and the cycle goes on
//! without the gated rules.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gpol_core::{PolicyDomain, RuleMap};
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::context::ApplyContext;

/// Status value meaning the device is entitled.
pub const ENTITLED_STATUS: &str = "enabled";

/// Errors reported by a status source transport.
#[derive(Error, Debug)]
pub enum StatusError {
    /// The status service could not be reached or queried.
    #[error("status source unavailable: {0}")]
    Unavailable(String),
}

/// Source of the subscription status property.
///
/// The raw property value is returned untyped so the gate can tell a
/// malformed answer from a negative one in its logs.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Query the current status property.
    async fn status(&self) -> Result<Value, StatusError>;
}

/// A status source with a fixed answer, for configured or test setups.
#[derive(Debug, Clone)]
pub struct StaticStatus(pub Value);

impl StaticStatus {
    /// A source reporting the device as entitled.
    pub fn enabled() -> Self {
        Self(Value::String(ENTITLED_STATUS.to_string()))
    }

    /// A source reporting the device as not entitled.
    pub fn disabled() -> Self {
        Self(Value::String("disabled".to_string()))
    }
}

#[async_trait]
impl StatusSource for StaticStatus {
    async fn status(&self) -> Result<Value, StatusError> {
        Ok(self.0.clone())
    }
}

/// Cached entitlement state plus the source used to refresh it.
pub struct EntitlementGate {
    source: Arc<dyn StatusSource>,
    timeout: Duration,
    enabled: RwLock<bool>,
}

impl EntitlementGate {
    /// Create a gate that starts as not entitled until the first refresh.
    pub fn new(source: Arc<dyn StatusSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            enabled: RwLock::new(false),
        }
    }

    /// Query the source and update the cached state.
    ///
    /// The query runs without holding the lock; the write lock is only
    /// taken to store the result.
    pub async fn refresh(&self, ctx: &ApplyContext) -> bool {
        tracing::debug!("refreshing entitlement status");

        let enabled = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                tracing::warn!("entitlement check cancelled; considering device as not entitled");
                false
            }
            answer = tokio::time::timeout(self.timeout, self.source.status()) => match answer {
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = self.timeout.as_secs_f64(),
                        "entitlement check timed out; considering device as not entitled"
                    );
                    false
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "no connection to entitlement status; considering device as not entitled");
                    false
                }
                Ok(Ok(Value::String(status))) => status == ENTITLED_STATUS,
                Ok(Ok(other)) => {
                    tracing::warn!(value = %other, "entitlement status returned an improper value; considering device as not entitled");
                    false
                }
            },
        };

        *self.enabled.write() = enabled;
        if enabled {
            tracing::debug!("device is entitled to restricted policies");
        } else {
            tracing::debug!("device is not entitled to restricted policies");
        }
        enabled
    }

    /// Last refreshed state.
    pub fn current(&self) -> bool {
        *self.enabled.read()
    }

}

impl std::fmt::Debug for EntitlementGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementGate")
            .field("timeout", &self.timeout)
            .field("enabled", &self.current())
            .finish()
    }
}

/// Empty every domain that requires entitlement.
///
/// Callers decide from the answer of their own [`EntitlementGate::refresh`],
/// not from [`EntitlementGate::current`], which a concurrent cycle may have
/// overwritten in the meantime.
pub fn filter_rules(rules: &mut RuleMap) {
    tracing::debug!("filtering rules requiring entitlement");
    for domain in PolicyDomain::all() {
        if domain.requires_entitlement() {
            rules.insert(domain.as_str().to_string(), Vec::new());
        }
    }
}
