//! Supervisory health signal for the store.
//!
//! [`HealthMonitor`] wraps a [`tokio::sync::watch`] channel. The pool
//! manager flips it to [`StoreHealth::Fatal`] when the database is
//! unreachable beyond the retry budget; the outer layer (the binary, a
//! readiness probe) observes it and decides whether to exit.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Current health of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreHealth {
    /// The store is serving requests.
    Healthy,
    /// The store hit a condition it cannot recover from locally.
    Fatal {
        /// Description of the failure that caused the transition.
        reason: String,
    },
}

impl StoreHealth {
    /// Returns `true` for [`StoreHealth::Fatal`].
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Shared health channel. Cloning shares the same state.
///
/// The first fatal reason sticks; later reports do not overwrite it.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    sender: Arc<watch::Sender<StoreHealth>>,
}

impl HealthMonitor {
    /// Creates a monitor in the [`StoreHealth::Healthy`] state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(StoreHealth::Healthy);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> StoreHealth {
        self.sender.borrow().clone()
    }

    /// Transitions to [`StoreHealth::Fatal`].
    ///
    /// Returns `true` if this call caused the transition.
    pub fn mark_fatal(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.sender.send_if_modified(|state| {
            if state.is_fatal() {
                return false;
            }
            *state = StoreHealth::Fatal { reason };
            true
        })
    }

    /// Creates a receiver that observes every future transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreHealth> {
        self.sender.subscribe()
    }

    /// Resolves with the fatal reason once the store turns fatal.
    pub async fn wait_for_fatal(&self) -> String {
        let mut rx = self.subscribe();
        let reason = match rx.wait_for(StoreHealth::is_fatal).await {
            Ok(state) => match &*state {
                StoreHealth::Fatal { reason } => Some(reason.clone()),
                StoreHealth::Healthy => None,
            },
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            // The sender lives inside `self`, so the channel cannot close.
            None => std::future::pending().await,
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn starts_healthy() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.current(), StoreHealth::Healthy);
    }

    #[test]
    fn first_fatal_reason_sticks() {
        let monitor = HealthMonitor::new();
        assert!(monitor.mark_fatal("pool exhausted"));
        assert!(!monitor.mark_fatal("second failure"));
        assert_eq!(
            monitor.current(),
            StoreHealth::Fatal {
                reason: "pool exhausted".to_string()
            }
        );
    }

    #[test]
    fn clones_share_state() {
        let monitor = HealthMonitor::new();
        let observer = monitor.clone();
        monitor.mark_fatal("down");
        assert!(observer.current().is_fatal());
    }

    #[tokio::test]
    async fn wait_for_fatal_resolves_after_transition() {
        let monitor = HealthMonitor::new();
        let waiter = monitor.clone();
        let task = tokio::spawn(async move { waiter.wait_for_fatal().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.mark_fatal("database unreachable");

        let Ok(Ok(reason)) = tokio::time::timeout(Duration::from_secs(1), task).await else {
            panic!("waiter should resolve");
        };
        assert_eq!(reason, "database unreachable");
    }

    #[test]
    fn serializes_with_status_tag() {
        let Ok(json) = serde_json::to_value(StoreHealth::Fatal {
            reason: "x".to_string(),
        }) else {
            panic!("serializable");
        };
        assert_eq!(json["status"], "fatal");
        assert_eq!(json["reason"], "x");
    }
}
