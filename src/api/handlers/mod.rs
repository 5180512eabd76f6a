//! HTTP request handlers for API endpoints.

pub mod health;
pub mod redirect;
pub mod stats;

pub use health::{availability_handler, health_handler};
pub use redirect::redirect_handler;
pub use stats::stats_handler;
