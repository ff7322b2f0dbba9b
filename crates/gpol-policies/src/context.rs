//! # Apply Context
//!
//! Cancellation travels with every apply cycle. Cancelling is cooperative:
//! the manager stops before dispatch if the token is already cancelled, and
//! backends and the entitlement check observe it through
//! [`ApplyContext::cancelled`]. A cancelled backend still has to return, and
//! its error counts like any other backend failure.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel every holder of this token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-cycle context handed to the entitlement check and every backend.
#[derive(Debug, Clone, Default)]
pub struct ApplyContext {
    cancel: CancelToken,
}

impl ApplyContext {
    /// A context that is never cancelled unless its token is.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to an existing token.
    pub fn with_cancel_token(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    /// The token backing this context.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Whether the cycle has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve once the cycle is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let ctx = ApplyContext::with_cancel_token(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
        token.cancel();
        assert!(ctx.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let ctx = ApplyContext::new();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        tokio::task::yield_now().await;
        ctx.cancel_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("cancellation observed")
            .expect("waiter task");
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let ctx = ApplyContext::new();
        ctx.cancel_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), ctx.cancelled())
            .await
            .expect("already cancelled");
    }
}
