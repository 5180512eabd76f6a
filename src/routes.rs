//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET /{code}`                 - Short link redirect
//! - `GET /health`                 - Health check: DB, fast store, job queue
//! - `GET /system/available`       - Maintenance state
//! - `GET /api/links/{id}/stats`   - Click statistics of one link
//!
//! Static routes win over `/{code}`, so `health` and `system` never reach the
//! resolver; both are also reserved as custom codes.

use crate::api::handlers::{
    availability_handler, health_handler, redirect_handler, stats_handler,
};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Route table with tracing, without path normalization.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/system/available", get(availability_handler))
        .route("/api/links/{id}/stats", get(stats_handler))
        .route("/{code}", get(redirect_handler))
        .with_state(state)
        .layer(tracing::layer())
}
