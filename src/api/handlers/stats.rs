//! Handler for per-link click statistics.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;

use crate::api::dto::stats::{StatsQuery, StatsResponse};
use crate::application::services::StatsRange;
use crate::error::AppError;
use crate::state::AppState;

/// Click counts of one link, per device, OS, country and referrer.
///
/// # Endpoint
///
/// `GET /api/links/{id}/stats?start=<unix>&end=<unix>`
///
/// `start` defaults to 24 hours ago, `end` to now. Both bounds are inclusive.
///
/// # Errors
///
/// Returns 400 Bad Request for a range outside 2024-01-01..now or with
/// `start > end`.
/// Returns 404 Not Found if the link does not exist.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let (start, end) = query.bounds()?;
    let range = StatsRange::resolve(start, end, Utc::now())?;

    let stats = state.stats_service.link_stats(id, range).await?;

    Ok(Json(StatsResponse {
        link_id: id,
        start: range.start.timestamp(),
        end: range.end.timestamp(),
        total: stats.total(),
        stats,
    }))
}
