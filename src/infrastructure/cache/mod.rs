//! Fast shared store and the link cache built on it.
//!
//! Provides a [`FastStore`] trait with two implementations:
//! - [`RedisStore`] - Production Redis-backed store
//! - [`MemoryStore`] - In-process store for development and tests
//!
//! [`LinkCache`] layers the short code → link cache over either one.

mod link_cache;
mod memory_store;
mod redis_store;
mod service;

pub use link_cache::LinkCache;
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use service::{FastStore, StoreError, StoreResult, WindowCount};

#[cfg(test)]
pub use service::MockFastStore;
