//! Business logic services for the application layer.

pub mod link_service;
pub mod rate_limiter;
pub mod resolver;
pub mod stats_service;

pub use link_service::{CreateLink, LinkService};
pub use rate_limiter::QuotaLimiter;
pub use resolver::{Resolution, ResolveRequest, Resolver};
pub use stats_service::{StatsRange, StatsService};
