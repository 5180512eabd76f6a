//! Repository trait definitions for the domain layer.
//!
//! Traits define the contract for the two stores behind the service; the
//! Postgres implementations live in `crate::infrastructure::persistence` and
//! mocks are generated via `mockall` for unit tests.
//!
//! # Available Repositories
//!
//! - [`LinkRepository`] - Durable short link records
//! - [`ClickRepository`] - Analytical click events
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod click_repository;
pub mod link_repository;

pub use click_repository::ClickRepository;
pub use link_repository::LinkRepository;

#[cfg(test)]
pub use click_repository::MockClickRepository;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
