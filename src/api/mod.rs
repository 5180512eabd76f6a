//! HTTP layer: handlers, DTOs and middleware.
//!
//! # Modules
//!
//! - [`dto`] - request/response shapes
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - request tracing

pub mod dto;
pub mod handlers;
pub mod middleware;
