//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx with bound
//! parameters.
//!
//! # Repositories
//!
//! - [`PgLinkRepository`] - Short link storage and retrieval
//! - [`PgClickRepository`] - Batched click event writes and range scans

pub mod pg_click_repository;
pub mod pg_link_repository;

pub use pg_click_repository::PgClickRepository;
pub use pg_link_repository::PgLinkRepository;
