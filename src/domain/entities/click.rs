//! Click analytics entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Referrer recorded when the request carries no `Referer` header.
pub const DIRECT_REFERRER: &str = "direct";

/// Key holding the per-dimension sum in [`ClickStats`] maps.
pub const TOTAL_KEY: &str = "total";

/// A single resolution, as staged in the buffer and stored for analytics.
///
/// Write-once: created when a short link resolves, serialized into the staging
/// list, consumed by exactly one flush cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub record_id: i64,
    pub geo: String,
    pub device: String,
    pub os: String,
    pub referrer: String,
    pub timestamp: DateTime<Utc>,
}

/// Value → occurrence count, with a [`TOTAL_KEY`] entry.
pub type DimensionCounts = BTreeMap<String, i64>;

/// Click counts broken down by dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClickStats {
    pub device_counts: DimensionCounts,
    pub os_counts: DimensionCounts,
    pub geo_counts: DimensionCounts,
    pub referrer_counts: DimensionCounts,
}

impl ClickStats {
    /// Aggregates a set of events.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ClickEvent>) -> Self {
        let mut stats = Self::default();
        for event in events {
            stats.record(event);
        }
        stats
    }

    /// Counts one event under every dimension.
    pub fn record(&mut self, event: &ClickEvent) {
        bump(&mut self.device_counts, &event.device);
        bump(&mut self.os_counts, &event.os);
        bump(&mut self.geo_counts, &event.geo);
        bump(&mut self.referrer_counts, &event.referrer);
    }

    /// Total number of events aggregated.
    pub fn total(&self) -> i64 {
        self.device_counts.get(TOTAL_KEY).copied().unwrap_or(0)
    }
}

fn bump(counts: &mut DimensionCounts, value: &str) {
    *counts.entry(value.to_string()).or_insert(0) += 1;
    *counts.entry(TOTAL_KEY.to_string()).or_insert(0) += 1;
}
