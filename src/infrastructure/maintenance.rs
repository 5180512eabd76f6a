//! Maintenance switch shared across processes.

use crate::infrastructure::cache::{FastStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Fast store key holding `"1"` while maintenance is on.
pub const MAINTENANCE_KEY: &str = "system:maintenance";

/// Maintenance flag: a static default from config OR a runtime flag in the
/// fast store.
#[derive(Clone)]
pub struct MaintenanceMode {
    store: Arc<dyn FastStore>,
    always_on: bool,
}

impl MaintenanceMode {
    pub fn new(store: Arc<dyn FastStore>, always_on: bool) -> Self {
        Self { store, always_on }
    }

    /// Returns `true` while maintenance is active.
    ///
    /// An unreachable store reads as "not in maintenance".
    pub async fn is_active(&self) -> bool {
        if self.always_on {
            return true;
        }

        match self.store.get(MAINTENANCE_KEY).await {
            Ok(Some(value)) => value == b"1",
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read maintenance flag: {}", e);
                false
            }
        }
    }

    /// Turns the runtime flag on for `ttl`, or off.
    ///
    /// # Errors
    ///
    /// Returns the store error if the flag could not be written.
    pub async fn set(&self, active: bool, ttl: Duration) -> StoreResult<()> {
        if active {
            self.store
                .set_with_ttl(MAINTENANCE_KEY, b"1".to_vec(), ttl)
                .await
        } else {
            self.store.delete(MAINTENANCE_KEY).await.map(|_| ())
        }
    }
}
