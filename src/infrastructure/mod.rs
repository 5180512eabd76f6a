//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence and the fast shared store.
//!
//! # Modules
//!
//! - [`cache`] - Fast store (Redis and in-memory) and the link cache
//! - [`maintenance`] - Runtime maintenance switch
//! - [`persistence`] - PostgreSQL repository implementations

pub mod cache;
pub mod maintenance;
pub mod persistence;
