//! Handlers for health and availability endpoints.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{AvailabilityResponse, CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: counts stored links
/// 2. **Fast store**: PING
/// 3. **Job queue**: open, with free slots reported
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let database = check_database(&state).await;
    let fast_store = check_fast_store(&state).await;
    let job_queue = check_job_queue(&state);

    let all_healthy = database.is_ok() && fast_store.is_ok() && job_queue.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            fast_store,
            job_queue,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    match state.links.count(None).await {
        Ok(total) => CheckStatus::ok(format!("Connected, {} links", total)),
        Err(e) => CheckStatus::error(format!("Database error: {}", e)),
    }
}

async fn check_fast_store(state: &AppState) -> CheckStatus {
    if state.store.ping().await {
        CheckStatus::ok("Reachable")
    } else {
        CheckStatus::error("PING failed")
    }
}

fn check_job_queue(state: &AppState) -> CheckStatus {
    if state.jobs.is_closed() {
        CheckStatus::error("Job queue is closed")
    } else {
        CheckStatus::ok(format!(
            "Free slots: {}/{}",
            state.jobs.available(),
            state.jobs.max_capacity()
        ))
    }
}

/// `GET /system/available`
///
/// `{"available": false}` while maintenance is active.
pub async fn availability_handler(State(state): State<AppState>) -> Json<AvailabilityResponse> {
    Json(AvailabilityResponse {
        available: !state.maintenance.is_active().await,
    })
}
