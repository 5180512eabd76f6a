//! Fast shared store trait and error types.

use async_trait::async_trait;
use std::time::Duration;

/// Errors that can occur during fast store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store operation error: {0}")]
    Operation(String),

    #[error("Store payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Result type for fast store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Counter state returned by [`FastStore::incr_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Value of the counter after this increment.
    pub count: u64,
    /// Time left until the counter key expires.
    pub ttl: Duration,
}

/// Key/value + list store shared by every process of the service.
///
/// Backs three concerns: the short link cache, the click staging list and the
/// fixed-window quota counters. Implementations must be safe to call from many
/// tasks at once; no coordination happens above this trait except the flush
/// lock in [`crate::domain::click_buffer::ClickBuffer`].
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisStore`] - Redis, used in production
/// - [`crate::infrastructure::cache::MemoryStore`] - in-process fallback for
///   development and tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FastStore: Send + Sync {
    /// Reads a plain value. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes a value that disappears after `ttl`.
    ///
    /// A zero `ttl` removes the key instead of writing it.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Removes a key. Returns `true` if something was deleted.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Appends values to the tail of a list and returns the new length.
    async fn push_back(&self, key: &str, values: Vec<Vec<u8>>) -> StoreResult<usize>;

    /// Reads up to `n` values from the head of a list without removing them.
    async fn range_front(&self, key: &str, n: usize) -> StoreResult<Vec<Vec<u8>>>;

    /// Drops the first `n` values of a list, keeping the rest.
    async fn trim_front(&self, key: &str, n: usize) -> StoreResult<()>;

    /// Current length of a list (zero if absent).
    async fn list_len(&self, key: &str) -> StoreResult<usize>;

    /// Atomically increments a counter, giving it an expiry of `window` only
    /// when it has none.
    ///
    /// Concurrent first writers never set two different expiries: the window
    /// is created once and every later increment lands inside it.
    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount>;

    /// Checks if the backend is reachable.
    async fn ping(&self) -> bool;
}
