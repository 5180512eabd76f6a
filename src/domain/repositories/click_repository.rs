//! Repository trait for the analytical click store.

use crate::domain::entities::ClickEvent;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Append-only store of click events.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgClickRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickRepository: Send + Sync {
    /// Writes all events as one batch and returns the number of rows stored.
    ///
    /// Either every row is written or none is.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn insert_batch(&self, events: Vec<ClickEvent>) -> Result<u64, AppError>;

    /// Returns the events of one link with `start <= timestamp <= end`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn find_in_range(
        &self,
        record_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>, AppError>;
}
