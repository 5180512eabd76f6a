//! Short code → link cache on top of the fast store.

use super::service::FastStore;
use crate::domain::entities::Link;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "url:";

/// Cache-aside view of [`Link`] records.
///
/// Entries expire with the link they hold, so the store never serves a link
/// past its expiry for long. Readers still re-check `expires_at` since clocks
/// and TTL granularity differ.
#[derive(Clone)]
pub struct LinkCache {
    store: Arc<dyn FastStore>,
}

impl LinkCache {
    pub fn new(store: Arc<dyn FastStore>) -> Self {
        Self { store }
    }

    fn build_key(code: &str) -> String {
        format!("{}{}", KEY_PREFIX, code)
    }

    /// Looks up a cached link.
    ///
    /// Store errors and undecodable entries degrade to a miss.
    pub async fn get(&self, code: &str) -> Option<Link> {
        let key = Self::build_key(code);

        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache MISS: {}", code);
                metrics::counter!("cache_misses_total").increment(1);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", code, e);
                metrics::counter!("cache_misses_total").increment(1);
                return None;
            }
        };

        match serde_json::from_slice::<Link>(&bytes) {
            Ok(link) => {
                debug!("Cache HIT: {} -> {}", code, link.destination);
                metrics::counter!("cache_hits_total").increment(1);
                Some(link)
            }
            Err(e) => {
                warn!("Dropping undecodable cache entry for {}: {}", code, e);
                metrics::counter!("cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Stores a snapshot of `link` until it expires.
    ///
    /// Returns `false` without writing when the link is already expired or the
    /// write failed.
    pub async fn put(&self, link: &Link, now: DateTime<Utc>) -> bool {
        let ttl = link.remaining_ttl(now);
        if ttl.is_zero() {
            debug!("Not caching expired link {}", link.code);
            return false;
        }

        let payload = match serde_json::to_vec(link) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode link {} for cache: {}", link.code, e);
                return false;
            }
        };

        match self
            .store
            .set_with_ttl(&Self::build_key(&link.code), payload, ttl)
            .await
        {
            Ok(()) => {
                debug!("Cache SET: {} (TTL: {}s)", link.code, ttl.as_secs());
                true
            }
            Err(e) => {
                warn!("Cache write failed for {}: {}", link.code, e);
                false
            }
        }
    }

    /// Removes a cached entry after the link changed or was deleted.
    pub async fn invalidate(&self, code: &str) {
        match self.store.delete(&Self::build_key(code)).await {
            Ok(true) => debug!("Cache INVALIDATE: {}", code),
            Ok(false) => {}
            Err(e) => warn!("Cache invalidate failed for {}: {}", code, e),
        }
    }
}
