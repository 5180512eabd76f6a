//! Click statistics service.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;

use crate::domain::entities::ClickStats;
use crate::domain::repositories::{ClickRepository, LinkRepository};
use crate::error::AppError;

/// Earliest instant a stats query may start at (2024-01-01T00:00:00Z).
pub const EARLIEST_STATS_START: i64 = 1_704_067_200;

/// Window used when the caller gives no start.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Validated, inclusive time range for a stats query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatsRange {
    /// Resolves optional bounds against `now`.
    ///
    /// `start` defaults to 24 hours before `now` and `end` to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `start` is before 2024-01-01 or in
    /// the future, if `end` is in the future, or if `start > end`.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let earliest = Utc
            .timestamp_opt(EARLIEST_STATS_START, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let start = start.unwrap_or(now - ChronoDuration::hours(DEFAULT_WINDOW_HOURS));
        let end = end.unwrap_or(now);

        if start < earliest || start > now {
            return Err(AppError::bad_request(
                "start must be between 2024-01-01 and now",
                json!({ "start": start.timestamp() }),
            ));
        }
        if end > now {
            return Err(AppError::bad_request(
                "end cannot be in the future",
                json!({ "end": end.timestamp() }),
            ));
        }
        if start > end {
            return Err(AppError::bad_request(
                "start must not be after end",
                json!({ "start": start.timestamp(), "end": end.timestamp() }),
            ));
        }

        Ok(Self { start, end })
    }
}

/// Service for per-link click analytics.
pub struct StatsService {
    links: Arc<dyn LinkRepository>,
    clicks: Arc<dyn ClickRepository>,
}

impl StatsService {
    /// Creates a new statistics service.
    pub fn new(links: Arc<dyn LinkRepository>, clicks: Arc<dyn ClickRepository>) -> Self {
        Self { links, clicks }
    }

    /// Counts clicks of one link inside `[start, end]`, per dimension.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] on analytical store errors.
    pub async fn query_click_stats(
        &self,
        record_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ClickStats, AppError> {
        let events = self.clicks.find_in_range(record_id, start, end).await?;
        Ok(ClickStats::from_events(&events))
    }

    /// Like [`Self::query_click_stats`], after checking that the link exists.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    /// Returns [`AppError::Store`] on database errors.
    pub async fn link_stats(
        &self,
        record_id: i64,
        range: StatsRange,
    ) -> Result<ClickStats, AppError> {
        if self.links.find_by_id(record_id).await?.is_none() {
            return Err(AppError::not_found(
                "Link not found",
                json!({ "id": record_id }),
            ));
        }

        self.query_click_stats(record_id, range.start, range.end)
            .await
    }
}
