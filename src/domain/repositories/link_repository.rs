//! Repository trait for the durable short link store.

use crate::domain::entities::{Link, LinkPatch, NewLink};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for short link records.
///
/// Lookups return `Ok(None)` when the row is absent. Expired rows are returned
/// as-is; expiry is a reader concern.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_link.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Finds a link by its short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError>;

    /// Finds a link by its id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn find_by_id(&self, id: i64) -> Result<Option<Link>, AppError>;

    /// Inserts a new link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the short code is already taken.
    /// Returns [`AppError::Store`] on database errors.
    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError>;

    /// Applies a partial update and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    /// Returns [`AppError::Conflict`] if the new short code collides.
    /// Returns [`AppError::Store`] on database errors.
    async fn update(&self, id: i64, patch: LinkPatch) -> Result<Link, AppError>;

    /// Deletes a link. Returns `Ok(false)` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Adds `by` to the cumulative click counter of a link.
    ///
    /// Returns `Ok(false)` if no link has this id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn increment_clicks(&self, id: i64, by: i64) -> Result<bool, AppError>;

    /// Counts links, optionally restricted to one owner.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on database errors.
    async fn count(&self, owner_id: Option<i64>) -> Result<i64, AppError>;
}
