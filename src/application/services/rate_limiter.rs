//! Fixed-window quota limiter backed by the fast store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::entities::{LimitPolicy, RateDecision};
use crate::error::AppError;
use crate::infrastructure::cache::FastStore;

const KEY_PREFIX: &str = "ratelimit:";

/// Per-scope request counter with a fixed expiry window.
///
/// The first request of a window creates the counter with a TTL of
/// `policy.window`; every later request in that window only increments it.
/// When the store is unreachable the limiter either lets requests through
/// (`fail_open`) or returns [`AppError::Store`].
#[derive(Clone)]
pub struct QuotaLimiter {
    store: Arc<dyn FastStore>,
    fail_open: bool,
}

impl QuotaLimiter {
    pub fn new(store: Arc<dyn FastStore>, fail_open: bool) -> Self {
        Self { store, fail_open }
    }

    /// Counts one request against `scope_key` and decides whether it may
    /// proceed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store fails and the limiter is
    /// configured fail-closed.
    pub async fn check(
        &self,
        scope_key: &str,
        policy: LimitPolicy,
    ) -> Result<RateDecision, AppError> {
        let key = format!("{}{}", KEY_PREFIX, scope_key);

        let window = match self.store.incr_window(&key, policy.window).await {
            Ok(window) => window,
            Err(e) if self.fail_open => {
                warn!("Rate limit store unavailable, allowing {}: {}", scope_key, e);
                return Ok(RateDecision::allow(0));
            }
            Err(e) => {
                warn!("Rate limit store unavailable, rejecting {}: {}", scope_key, e);
                return Err(e.into());
            }
        };

        if window.count > policy.max_requests {
            debug!(
                "Quota exceeded for {} ({} > {})",
                scope_key, window.count, policy.max_requests
            );
            let retry_after = window.ttl.max(Duration::from_millis(1));
            return Ok(RateDecision::deny(window.count, retry_after));
        }

        Ok(RateDecision::allow(window.count))
    }

    /// Like [`Self::check`] for `{scope}:{identity}`, turning a denial into
    /// [`AppError::QuotaExceeded`] worded for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QuotaExceeded`] when the quota is used up, or
    /// [`AppError::Store`] as described on [`Self::check`].
    pub async fn enforce(
        &self,
        scope: &str,
        identity: &str,
        policy: LimitPolicy,
        action: &str,
    ) -> Result<RateDecision, AppError> {
        let decision = self
            .check(&format!("{}:{}", scope, identity), policy)
            .await?;

        if !decision.allowed {
            metrics::counter!("rate_limit_denied_total", "scope" => scope.to_string())
                .increment(1);
            return Err(AppError::quota_exceeded(action, decision.retry_after));
        }

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::{MemoryStore, MockFastStore, StoreError};

    const POLICY: LimitPolicy = LimitPolicy::new(3, Duration::from_secs(30));

    #[tokio::test(start_paused = true)]
    async fn test_allows_exactly_max_requests_per_window() {
        let limiter = QuotaLimiter::new(Arc::new(MemoryStore::new()), true);

        for expected in 1..=3 {
            let decision = limiter.check("resolve:10.0.0.1", POLICY).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
        }

        let denied = limiter.check("resolve:10.0.0.1", POLICY).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after > Duration::ZERO);
        assert!(denied.retry_after <= POLICY.window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = QuotaLimiter::new(Arc::new(MemoryStore::new()), true);

        for _ in 0..4 {
            limiter.check("resolve:10.0.0.1", POLICY).await.unwrap();
        }

        tokio::time::advance(POLICY.window + Duration::from_millis(1)).await;

        let decision = limiter.check("resolve:10.0.0.1", POLICY).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let limiter = QuotaLimiter::new(Arc::new(MemoryStore::new()), true);
        let tight = LimitPolicy::new(1, Duration::from_secs(30));

        assert!(limiter.check("resolve:a", tight).await.unwrap().allowed);
        assert!(!limiter.check("resolve:a", tight).await.unwrap().allowed);
        assert!(limiter.check("resolve:b", tight).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_enforce_maps_denial_to_quota_error() {
        let limiter = QuotaLimiter::new(Arc::new(MemoryStore::new()), true);
        let tight = LimitPolicy::new(1, Duration::from_secs(30));

        limiter
            .enforce("resolve", "1.2.3.4", tight, "Resolve URL")
            .await
            .unwrap();
        let err = limiter
            .enforce("resolve", "1.2.3.4", tight, "Resolve URL")
            .await
            .unwrap_err();

        match err {
            AppError::QuotaExceeded {
                message,
                retry_after,
            } => {
                assert!(retry_after > Duration::ZERO);
                assert!(message.starts_with("you have exhausted your quota for Resolve URL"));
            }
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
    }

    fn broken_store() -> MockFastStore {
        let mut store = MockFastStore::new();
        store
            .expect_incr_window()
            .returning(|_, _| Err(StoreError::Connection("refused".to_string())));
        store
    }

    #[tokio::test]
    async fn test_fail_open_allows_when_store_down() {
        let limiter = QuotaLimiter::new(Arc::new(broken_store()), true);

        let decision = limiter.check("resolve:x", POLICY).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 0);
    }

    #[tokio::test]
    async fn test_fail_closed_surfaces_store_error() {
        let limiter = QuotaLimiter::new(Arc::new(broken_store()), false);

        let err = limiter.check("resolve:x", POLICY).await.unwrap_err();
        assert!(matches!(err, AppError::Store { .. }));
    }

    #[tokio::test]
    async fn test_key_is_namespaced() {
        let mut store = MockFastStore::new();
        store
            .expect_incr_window()
            .withf(|key, window| key == "ratelimit:shorten:7" && *window == POLICY.window)
            .times(1)
            .returning(|_, window| {
                Ok(crate::infrastructure::cache::WindowCount {
                    count: 1,
                    ttl: window,
                })
            });

        let limiter = QuotaLimiter::new(Arc::new(store), false);
        limiter
            .enforce("shorten", "7", POLICY, "Shorten URL")
            .await
            .unwrap();
    }
}
