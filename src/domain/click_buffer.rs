//! Staging buffer for click events and the batch flush that drains it.
//!
//! Events are serialized into a list in the fast store so they outlive a
//! process restart. A per-process count tracks how many entries this process
//! has staged since the last flush; a flush drains at most that many from the
//! head of the list, so entries appended while a drain is in progress stay put
//! for the next cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::entities::ClickEvent;
use crate::domain::repositories::{ClickRepository, LinkRepository};
use crate::error::AppError;
use crate::infrastructure::cache::FastStore;

/// Fast store list holding serialized, not yet flushed events.
pub const STAGING_LIST_KEY: &str = "track_event";

/// Upper bound for a single retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Tuning for [`ClickBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct FlushSettings {
    /// Tracked count at which `capture` flushes inline.
    pub threshold: usize,
    /// Extra bulk-write attempts after the first failure.
    pub retry_attempts: usize,
    /// First backoff delay; each later one doubles.
    pub retry_base_delay: Duration,
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            threshold: 200,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries taken off the staging list.
    pub drained: usize,
    /// Rows written to the analytical store.
    pub written: u64,
    /// Entries that could not be decoded and were discarded.
    pub dropped: usize,
    /// Entries put back on the staging list after the write failed.
    pub requeued: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.drained == 0
    }
}

/// Buffered click ingestion.
///
/// Holds two locks: `flush_lock` keeps flush cycles mutually exclusive and
/// `tracked` guards the count. The count lock is never held across the bulk
/// write, so captures keep flowing while a batch is being stored.
///
/// Once a batch has been re-queued, captures stop starting threshold flushes
/// until the next [`flush`](Self::flush) call from the periodic timer.
pub struct ClickBuffer {
    store: Arc<dyn FastStore>,
    clicks: Arc<dyn ClickRepository>,
    links: Arc<dyn LinkRepository>,
    settings: FlushSettings,
    tracked: Mutex<usize>,
    flush_lock: Mutex<()>,
    inline_paused: AtomicBool,
}

impl ClickBuffer {
    pub fn new(
        store: Arc<dyn FastStore>,
        clicks: Arc<dyn ClickRepository>,
        links: Arc<dyn LinkRepository>,
        settings: FlushSettings,
    ) -> Self {
        Self {
            store,
            clicks,
            links,
            settings,
            tracked: Mutex::new(0),
            flush_lock: Mutex::new(()),
            inline_paused: AtomicBool::new(false),
        }
    }

    /// Number of events staged by this process and not yet flushed.
    pub async fn len(&self) -> usize {
        *self.tracked.lock().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Adopts entries left on the staging list by a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the list length cannot be read.
    pub async fn recover(&self) -> Result<usize, AppError> {
        let len = self.store.list_len(STAGING_LIST_KEY).await?;
        *self.tracked.lock().await = len;

        if len > 0 {
            info!("Recovered {} staged click events", len);
        }
        Ok(len)
    }

    /// Stages one event. Flushes inline once the threshold is reached, unless
    /// a flush is already running or the last write was re-queued.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the event could not be staged. Flush
    /// failures after a successful append are logged, not returned.
    pub async fn capture(&self, event: ClickEvent) -> Result<(), AppError> {
        let payload = serde_json::to_vec(&event).map_err(|e| {
            AppError::store("Failed to encode click event", json!({ "reason": e.to_string() }))
        })?;

        self.store.push_back(STAGING_LIST_KEY, vec![payload]).await?;
        metrics::counter!("clicks_captured_total").increment(1);

        let reached = {
            let mut tracked = self.tracked.lock().await;
            *tracked += 1;
            *tracked >= self.settings.threshold
        };

        if !reached || self.inline_paused.load(Ordering::Acquire) {
            return Ok(());
        }

        let Ok(cycle) = self.flush_lock.try_lock() else {
            debug!("Flush threshold reached, flush already running");
            return Ok(());
        };

        debug!("Flush threshold reached");
        if let Err(e) = self.flush_locked(cycle).await {
            error!("Threshold flush failed: {}", e);
        }

        Ok(())
    }

    /// Runs one flush cycle.
    ///
    /// Drains `min(tracked, list length)` entries from the head of the staging
    /// list, decodes them and writes them as one batch. A batch that still
    /// fails after retrying is pushed back onto the list.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the staging list cannot be read or
    /// trimmed, or if a failed batch could not be re-queued.
    pub async fn flush(&self) -> Result<FlushReport, AppError> {
        let cycle = self.flush_lock.lock().await;
        self.inline_paused.store(false, Ordering::Release);
        self.flush_locked(cycle).await
    }

    async fn flush_locked(&self, _cycle: MutexGuard<'_, ()>) -> Result<FlushReport, AppError> {
        let raw = self.drain().await?;
        if raw.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut report = FlushReport {
            drained: raw.len(),
            ..FlushReport::default()
        };

        let mut events = Vec::with_capacity(raw.len());
        let mut payloads = Vec::with_capacity(raw.len());
        for payload in raw {
            match serde_json::from_slice::<ClickEvent>(&payload) {
                Ok(event) => {
                    events.push(event);
                    payloads.push(payload);
                }
                Err(e) => {
                    warn!("Dropping undecodable click event: {}", e);
                    report.dropped += 1;
                }
            }
        }

        if events.is_empty() {
            return Ok(report);
        }

        let per_link = count_per_link(&events);

        match self.write_batch(events).await {
            Ok(written) => {
                report.written = written;
                metrics::counter!("clicks_flushed_total").increment(written);
                info!("Flushed {} click events", written);
                self.bump_link_counters(per_link).await;
            }
            Err(e) => {
                error!(
                    "Bulk write of {} click events failed, re-queueing: {}",
                    payloads.len(),
                    e
                );
                self.inline_paused.store(true, Ordering::Release);
                report.requeued = self.requeue(payloads).await?;
            }
        }

        Ok(report)
    }

    /// Takes the flushable prefix off the staging list.
    async fn drain(&self) -> Result<Vec<Vec<u8>>, AppError> {
        let mut tracked = self.tracked.lock().await;

        let len = self.store.list_len(STAGING_LIST_KEY).await?;
        if *tracked > len {
            warn!(
                "Tracked count {} exceeds staged entries {}, reconciling",
                *tracked, len
            );
            *tracked = len;
        }

        let n = *tracked;
        if n == 0 {
            return Ok(Vec::new());
        }

        let raw = self.store.range_front(STAGING_LIST_KEY, n).await?;
        self.store.trim_front(STAGING_LIST_KEY, raw.len()).await?;
        *tracked = tracked.saturating_sub(raw.len());

        debug!("Drained {} staged click events", raw.len());
        Ok(raw)
    }

    async fn write_batch(&self, events: Vec<ClickEvent>) -> Result<u64, AppError> {
        let strategy = retry_delays(&self.settings).map(jitter);

        let clicks = Arc::clone(&self.clicks);
        Retry::start(strategy, || {
            let clicks = Arc::clone(&clicks);
            let events = events.clone();
            async move {
                clicks.insert_batch(events).await.inspect_err(|e| {
                    warn!("Click batch write attempt failed: {}", e);
                })
            }
        })
        .await
    }

    async fn requeue(&self, payloads: Vec<Vec<u8>>) -> Result<usize, AppError> {
        let count = payloads.len();

        if let Err(e) = self.store.push_back(STAGING_LIST_KEY, payloads).await {
            error!("Lost {} click events, re-queue failed: {}", count, e);
            return Err(e.into());
        }

        *self.tracked.lock().await += count;
        metrics::counter!("clicks_requeued_total").increment(count as u64);
        Ok(count)
    }

    async fn bump_link_counters(&self, per_link: BTreeMap<i64, i64>) {
        for (id, clicks) in per_link {
            match self.links.increment_clicks(id, clicks).await {
                Ok(true) => {}
                Ok(false) => debug!("Link {} no longer exists, skipping counter", id),
                Err(e) => warn!("Failed to bump click counter of link {}: {}", id, e),
            }
        }
    }
}

/// Backoff delays starting at `retry_base_delay` and doubling, capped at
/// [`MAX_RETRY_DELAY`]. Millisecond resolution, rounded down to an even value.
fn retry_delays(settings: &FlushSettings) -> impl Iterator<Item = Duration> {
    let half = (settings.retry_base_delay.as_millis() as u64 / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(half)
        .max_delay(MAX_RETRY_DELAY)
        .take(settings.retry_attempts)
}

fn count_per_link(events: &[ClickEvent]) -> BTreeMap<i64, i64> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.record_id).or_insert(0) += 1;
    }
    counts
}
