#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tower::Layer;

use link_resolver::AppError;
use link_resolver::config::{Config, ExecutionContext};
use link_resolver::domain::click_worker::{BackgroundJob, JobContext};
use link_resolver::domain::entities::{ClickEvent, LimitPolicy, Link, LinkPatch, NewLink};
use link_resolver::domain::repositories::{ClickRepository, LinkRepository};
use link_resolver::infrastructure::cache::{
    FastStore, MemoryStore, StoreError, StoreResult, WindowCount,
};
use link_resolver::state::AppState;

pub const NOT_FOUND_URL: &str = "https://example.com/not-found";
pub const MAINTENANCE_URL: &str = "https://example.com/maintenance";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://test@localhost/test".to_string(),
        analytics_database_url: "postgres://test@localhost/test".to_string(),
        redis_url: None,
        listen_addr: "127.0.0.1:0".to_string(),
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        app_env: ExecutionContext::Production,
        not_found_url: NOT_FOUND_URL.to_string(),
        maintenance_url: MAINTENANCE_URL.to_string(),
        maintenance_mode: false,
        flush_threshold: 1000,
        flush_interval_secs: 10,
        flush_retry_attempts: 0,
        background_queue_capacity: 1000,
        background_worker_concurrency: 2,
        background_enqueue_timeout_ms: 5,
        dynamic_policy: LimitPolicy::new(100, Duration::from_secs(30)),
        shorten_policy: LimitPolicy::new(10, Duration::from_secs(60)),
        rate_limit_fail_open: true,
        behind_proxy: false,
        db_max_connections: 5,
        db_connect_timeout: 5,
        db_idle_timeout: 60,
        db_max_lifetime: 300,
    }
}

/// Durable link store kept in memory, counting lookups by code.
#[derive(Default)]
pub struct InMemoryLinks {
    links: Mutex<Vec<Link>>,
    next_id: AtomicI64,
    pub lookups: AtomicUsize,
}

impl InMemoryLinks {
    pub fn seed(&self, code: &str, destination: &str, expires_at: DateTime<Utc>) -> Link {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let link = Link::new(
            id,
            code.to_string(),
            destination.to_string(),
            None,
            expires_at,
            now,
            now,
            0,
        );
        self.links.lock().unwrap().push(link.clone());
        link
    }

    pub fn seed_live(&self, code: &str, destination: &str) -> Link {
        self.seed(code, destination, Utc::now() + ChronoDuration::hours(1))
    }

    pub fn get(&self, id: i64) -> Option<Link> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinks {
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Link>, AppError> {
        Ok(self.get(id))
    }

    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError> {
        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| l.code == new_link.code) {
            return Err(AppError::conflict("Unique constraint violation", json!({})));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let link = Link::new(
            id,
            new_link.code,
            new_link.destination,
            new_link.owner_id,
            new_link.expires_at,
            now,
            now,
            0,
        );
        links.push(link.clone());
        Ok(link)
    }

    async fn update(&self, id: i64, patch: LinkPatch) -> Result<Link, AppError> {
        let mut links = self.links.lock().unwrap();
        let link = links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::not_found("Link not found", json!({ "id": id })))?;

        if let Some(code) = patch.code {
            link.code = code;
        }
        if let Some(destination) = patch.destination {
            link.destination = destination;
        }
        if let Some(expires_at) = patch.expires_at {
            link.expires_at = expires_at;
        }
        link.updated_at = Utc::now();
        Ok(link.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| l.id != id);
        Ok(links.len() < before)
    }

    async fn increment_clicks(&self, id: i64, by: i64) -> Result<bool, AppError> {
        let mut links = self.links.lock().unwrap();
        match links.iter_mut().find(|l| l.id == id) {
            Some(link) => {
                link.total_clicks += by;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, owner_id: Option<i64>) -> Result<i64, AppError> {
        let links = self.links.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| owner_id.is_none() || l.owner_id == owner_id)
            .count() as i64)
    }
}

/// Analytical store kept in memory.
///
/// `fail` makes every batch write error out. With `hold` set, each batch
/// write signals `entered` and waits for `release`.
#[derive(Default)]
pub struct InMemoryClicks {
    events: Mutex<Vec<ClickEvent>>,
    pub fail: AtomicBool,
    pub hold: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
    pub batches: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl InMemoryClicks {
    pub fn stored(&self) -> Vec<ClickEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClickRepository for InMemoryClicks {
    async fn insert_batch(&self, events: Vec<ClickEvent>) -> Result<u64, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::store("Database error", json!({})));
        }

        self.batches.fetch_add(1, Ordering::SeqCst);
        let written = events.len() as u64;
        self.events.lock().unwrap().extend(events);
        Ok(written)
    }

    async fn find_in_range(
        &self,
        record_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>, AppError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.record_id == record_id && e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect())
    }
}

/// Fast store that is always unreachable.
pub struct DownStore;

#[async_trait]
impl FastStore for DownStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(down())
    }
    async fn set_with_ttl(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<()> {
        Err(down())
    }
    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Err(down())
    }
    async fn push_back(&self, _key: &str, _values: Vec<Vec<u8>>) -> StoreResult<usize> {
        Err(down())
    }
    async fn range_front(&self, _key: &str, _n: usize) -> StoreResult<Vec<Vec<u8>>> {
        Err(down())
    }
    async fn trim_front(&self, _key: &str, _n: usize) -> StoreResult<()> {
        Err(down())
    }
    async fn list_len(&self, _key: &str) -> StoreResult<usize> {
        Err(down())
    }
    async fn incr_window(&self, _key: &str, _window: Duration) -> StoreResult<WindowCount> {
        Err(down())
    }
    async fn ping(&self) -> bool {
        false
    }
}

fn down() -> StoreError {
    StoreError::Connection("connection refused".to_string())
}

/// Wired state over in-memory stores.
pub struct TestApp {
    pub state: AppState,
    pub links: Arc<InMemoryLinks>,
    pub clicks: Arc<InMemoryClicks>,
    pub store: Arc<dyn FastStore>,
    pub jobs_rx: mpsc::Receiver<BackgroundJob>,
    pub job_context: JobContext,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: Config, store: Arc<dyn FastStore>) -> Self {
        let links = Arc::new(InMemoryLinks::default());
        let clicks = Arc::new(InMemoryClicks::default());

        let parts = AppState::build(&config, Arc::clone(&store), links.clone(), clicks.clone());

        Self {
            state: parts.state,
            links,
            clicks,
            store,
            jobs_rx: parts.jobs_rx,
            job_context: parts.job_context,
        }
    }

    /// Runs every queued background job inline.
    pub async fn run_jobs(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs_rx.try_recv() {
            self.job_context.run(job).await;
            ran += 1;
        }
        ran
    }
}

pub async fn create_test_link(
    pool: &PgPool,
    code: &str,
    destination: &str,
    expires_in: ChronoDuration,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO links (code, destination, expires_at) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(code)
    .bind(destination)
    .bind(Utc::now() + expires_in)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
