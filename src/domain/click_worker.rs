//! Background job queue for work the redirect path must not wait on.
//!
//! Resolution hands off cache repopulation and click capture through a
//! bounded channel. A single worker drains it with bounded concurrency, and a
//! separate timer task flushes the click buffer at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::click_buffer::ClickBuffer;
use crate::domain::entities::{ClickEvent, Link};
use crate::infrastructure::cache::LinkCache;

/// Work dispatched from the resolve path.
#[derive(Debug, Clone)]
pub enum BackgroundJob {
    /// Write a freshly read link into the cache.
    PopulateCache(Link),
    /// Stage a click event for analytics.
    Capture(ClickEvent),
}

impl BackgroundJob {
    fn kind(&self) -> &'static str {
        match self {
            BackgroundJob::PopulateCache(_) => "populate_cache",
            BackgroundJob::Capture(_) => "capture",
        }
    }
}

/// Sending half of the job queue.
///
/// When the queue is full, `dispatch` waits at most `enqueue_timeout` for a
/// slot and then drops the job.
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<BackgroundJob>,
    enqueue_timeout: Duration,
}

/// Creates a bounded job queue.
pub fn job_queue(
    capacity: usize,
    enqueue_timeout: Duration,
) -> (JobSender, mpsc::Receiver<BackgroundJob>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (JobSender { tx, enqueue_timeout }, rx)
}

impl JobSender {
    /// Queues a job. Returns `false` if it was dropped.
    pub async fn dispatch(&self, job: BackgroundJob) -> bool {
        let job = match self.tx.try_send(job) {
            Ok(()) => return true,
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Closed(job)) => {
                dropped(&job, "queue closed");
                return false;
            }
        };

        match self.tx.send_timeout(job, self.enqueue_timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(job)) => {
                dropped(&job, "queue full");
                false
            }
            Err(SendTimeoutError::Closed(job)) => {
                dropped(&job, "queue closed");
                false
            }
        }
    }

    /// Free slots left in the queue.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn dropped(job: &BackgroundJob, reason: &str) {
    warn!(job = job.kind(), "Dropping background job: {}", reason);
    metrics::counter!("background_jobs_dropped_total", "job" => job.kind()).increment(1);
}

/// What background jobs operate on.
#[derive(Clone)]
pub struct JobContext {
    pub cache: LinkCache,
    pub buffer: Arc<ClickBuffer>,
}

impl JobContext {
    /// Runs one job. Failures are logged and swallowed.
    pub async fn run(&self, job: BackgroundJob) {
        match job {
            BackgroundJob::PopulateCache(link) => {
                self.cache.put(&link, Utc::now()).await;
            }
            BackgroundJob::Capture(event) => {
                let record_id = event.record_id;
                if let Err(e) = self.buffer.capture(event).await {
                    error!("Failed to capture click for link {}: {}", record_id, e);
                }
            }
        }
    }
}

/// Drains the job queue until every sender is dropped.
///
/// At most `concurrency` jobs run at once. Returns after the last in-flight
/// job completes.
pub async fn run_background_worker(
    mut rx: mpsc::Receiver<BackgroundJob>,
    ctx: JobContext,
    concurrency: usize,
) {
    info!(concurrency, "Background worker started");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        let ctx = ctx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            ctx.run(job).await;
        });

        while let Some(done) = tasks.try_join_next() {
            log_join(done);
        }
    }

    while let Some(done) = tasks.join_next().await {
        log_join(done);
    }

    info!("Background worker drained");
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Background job panicked: {}", e);
    }
}

/// Flushes the click buffer every `interval` until `shutdown` flips to `true`,
/// then runs one final flush.
pub async fn run_flush_timer(
    buffer: Arc<ClickBuffer>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => flush_logged(&buffer, "timer").await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    flush_logged(&buffer, "shutdown").await;
    info!("Flush timer stopped");
}

async fn flush_logged(buffer: &ClickBuffer, trigger: &str) {
    match buffer.flush().await {
        Ok(report) if report.is_empty() => debug!(trigger, "Nothing to flush"),
        Ok(report) => debug!(trigger, ?report, "Flush cycle finished"),
        Err(e) => error!(trigger, "Flush cycle failed: {}", e),
    }
}
