//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! the fast store, validation, and business rules. Services consume repository
//! traits and provide a clean API for HTTP handlers and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::resolver::Resolver`] - Short code resolution
//! - [`services::rate_limiter::QuotaLimiter`] - Fixed-window quotas
//! - [`services::link_service::LinkService`] - Short link management
//! - [`services::stats_service::StatsService`] - Click analytics queries

pub mod services;
