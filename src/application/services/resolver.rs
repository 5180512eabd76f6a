//! Short code resolution with cache-aside lookup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ExecutionContext;
use crate::domain::click_event::ClientInfo;
use crate::domain::click_worker::{BackgroundJob, JobSender};
use crate::domain::entities::{ClickEvent, LimitPolicy, Link};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::infrastructure::cache::LinkCache;
use crate::infrastructure::maintenance::MaintenanceMode;

use super::rate_limiter::QuotaLimiter;

/// Quota scope for resolve traffic.
pub const RESOLVE_SCOPE: &str = "resolve";

/// Action name used in quota error messages.
pub const RESOLVE_ACTION: &str = "Resolve URL";

/// One incoming resolve.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub code: String,
    /// Skip the cache and the maintenance switch, re-read the durable store.
    pub force_revalidate: bool,
    pub client: ClientInfo,
}

/// Outcome of a resolve that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Link),
    NotFound,
    Maintenance,
}

/// Resolves short codes to links.
///
/// # Request Flow
///
/// 1. Maintenance switch (unless forced)
/// 2. Per-client quota under [`RESOLVE_SCOPE`]
/// 3. Cache lookup (unless forced); a live entry is returned directly
/// 4. Durable store lookup; expired or absent rows resolve as not found
/// 5. Cache repopulation and click capture are queued as background jobs
pub struct Resolver {
    links: Arc<dyn LinkRepository>,
    cache: LinkCache,
    limiter: QuotaLimiter,
    maintenance: MaintenanceMode,
    jobs: JobSender,
    policy: LimitPolicy,
    context: ExecutionContext,
}

impl Resolver {
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: LinkCache,
        limiter: QuotaLimiter,
        maintenance: MaintenanceMode,
        jobs: JobSender,
        policy: LimitPolicy,
        context: ExecutionContext,
    ) -> Self {
        Self {
            links,
            cache,
            limiter,
            maintenance,
            jobs,
            policy,
            context,
        }
    }

    /// Resolves one short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QuotaExceeded`] when the client used up its quota.
    /// Returns [`AppError::Store`] when the durable store fails, or when the
    /// limiter is fail-closed and the fast store is down.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<Resolution, AppError> {
        if !request.force_revalidate && self.maintenance.is_active().await {
            debug!("Maintenance active, skipping resolve of {}", request.code);
            return Ok(Resolution::Maintenance);
        }

        self.limiter
            .enforce(
                RESOLVE_SCOPE,
                request.client.identity(),
                self.policy,
                RESOLVE_ACTION,
            )
            .await?;

        let now = Utc::now();

        if !request.force_revalidate
            && let Some(link) = self.cache.get(&request.code).await
        {
            if !link.is_expired_at(now) {
                self.capture(&link, &request.client, now).await;
                return Ok(Resolution::Found(link));
            }
            debug!("Cached link {} is stale, re-reading", request.code);
        }

        let Some(link) = self.links.find_by_code(&request.code).await? else {
            return Ok(Resolution::NotFound);
        };

        if link.is_expired_at(now) {
            debug!("Link {} expired at {}", link.code, link.expires_at);
            return Ok(Resolution::NotFound);
        }

        self.jobs
            .dispatch(BackgroundJob::PopulateCache(link.clone()))
            .await;
        self.capture(&link, &request.client, now).await;

        Ok(Resolution::Found(link))
    }

    async fn capture(&self, link: &Link, client: &ClientInfo, now: DateTime<Utc>) {
        if !self.context.captures_clicks() {
            return;
        }

        let event = ClickEvent::capture(link.id, client, now);
        self.jobs.dispatch(BackgroundJob::Capture(event)).await;
    }
}
