//! Shared application state injected into every handler.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::services::{LinkService, QuotaLimiter, Resolver, StatsService};
use crate::config::Config;
use crate::domain::click_buffer::ClickBuffer;
use crate::domain::click_worker::{BackgroundJob, JobContext, JobSender, job_queue};
use crate::domain::repositories::{ClickRepository, LinkRepository};
use crate::infrastructure::cache::{FastStore, LinkCache};
use crate::infrastructure::maintenance::MaintenanceMode;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub link_service: Arc<LinkService>,
    pub stats_service: Arc<StatsService>,
    pub maintenance: MaintenanceMode,
    pub store: Arc<dyn FastStore>,
    pub links: Arc<dyn LinkRepository>,
    pub buffer: Arc<ClickBuffer>,
    pub jobs: JobSender,
    pub not_found_url: Arc<str>,
    pub maintenance_url: Arc<str>,
    pub behind_proxy: bool,
}

/// Everything wired from one configuration.
///
/// The state goes to the router; the receiver and the job context go to the
/// background worker. Dropping every clone of the state closes the queue.
pub struct AppParts {
    pub state: AppState,
    pub jobs_rx: mpsc::Receiver<BackgroundJob>,
    pub job_context: JobContext,
}

impl AppState {
    /// Wires services on top of the given stores.
    pub fn build(
        config: &Config,
        store: Arc<dyn FastStore>,
        links: Arc<dyn LinkRepository>,
        clicks: Arc<dyn ClickRepository>,
    ) -> AppParts {
        let cache = LinkCache::new(Arc::clone(&store));
        let limiter = QuotaLimiter::new(Arc::clone(&store), config.rate_limit_fail_open);
        let maintenance = MaintenanceMode::new(Arc::clone(&store), config.maintenance_mode);

        let buffer = Arc::new(ClickBuffer::new(
            Arc::clone(&store),
            Arc::clone(&clicks),
            Arc::clone(&links),
            config.flush_settings(),
        ));

        let (jobs, jobs_rx) = job_queue(config.background_queue_capacity, config.enqueue_timeout());

        let resolver = Resolver::new(
            Arc::clone(&links),
            cache.clone(),
            limiter.clone(),
            maintenance.clone(),
            jobs.clone(),
            config.dynamic_policy,
            config.app_env,
        );

        let link_service = LinkService::new(
            Arc::clone(&links),
            cache.clone(),
            limiter,
            config.shorten_policy,
        );
        let stats_service = StatsService::new(Arc::clone(&links), clicks);

        let job_context = JobContext {
            cache,
            buffer: Arc::clone(&buffer),
        };

        let state = AppState {
            resolver: Arc::new(resolver),
            link_service: Arc::new(link_service),
            stats_service: Arc::new(stats_service),
            maintenance,
            store,
            links,
            buffer,
            jobs,
            not_found_url: Arc::from(config.not_found_url.as_str()),
            maintenance_url: Arc::from(config.maintenance_url.as_str()),
            behind_proxy: config.behind_proxy,
        };

        AppParts {
            state,
            jobs_rx,
            job_context,
        }
    }
}
