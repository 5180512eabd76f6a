//! DTOs for per-link click statistics.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::domain::entities::ClickStats;
use crate::error::AppError;

/// `GET /api/links/{id}/stats?start=&end=`, bounds in unix seconds.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StatsQuery {
    #[validate(range(min = 0))]
    pub start: Option<i64>,
    #[validate(range(min = 0))]
    pub end: Option<i64>,
}

impl StatsQuery {
    /// Converts the bounds to timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for out-of-range values.
    pub fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
        self.validate().map_err(|e| {
            AppError::bad_request(
                "Invalid query parameters",
                json!({ "reason": e.to_string() }),
            )
        })?;

        Ok((to_datetime(self.start)?, to_datetime(self.end)?))
    }
}

fn to_datetime(secs: Option<i64>) -> Result<Option<DateTime<Utc>>, AppError> {
    secs.map(|s| {
        Utc.timestamp_opt(s, 0).single().ok_or_else(|| {
            AppError::bad_request("Timestamp out of range", json!({ "value": s }))
        })
    })
    .transpose()
}

/// Click counts of one link over a time range.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub link_id: i64,
    pub start: i64,
    pub end: i64,
    pub total: i64,
    #[serde(flatten)]
    pub stats: ClickStats,
}
