//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{HealthMonitor, StoreHealth};
use crate::error::StoreError;
use crate::persistence::SessionStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backing session store.
    pub store: Arc<dyn SessionStore>,
    /// Store health, flipped to fatal by the pool manager.
    pub health: HealthMonitor,
}

impl AppState {
    /// Fails fast once the store has turned fatal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] carrying the fatal reason.
    pub fn ensure_serving(&self) -> Result<(), StoreError> {
        match self.health.current() {
            StoreHealth::Healthy => Ok(()),
            StoreHealth::Fatal { reason } => Err(StoreError::Unavailable(reason)),
        }
    }
}
