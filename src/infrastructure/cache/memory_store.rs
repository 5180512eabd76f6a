//! In-process fast store for development and tests.

use super::service::{FastStore, StoreResult, WindowCount};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Minimum time between two sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct MemoryState {
    values: HashMap<String, (Vec<u8>, Instant)>,
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    counters: HashMap<String, (u64, Instant)>,
    next_sweep: Instant,
}

impl MemoryState {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            lists: HashMap::new(),
            counters: HashMap::new(),
            next_sweep: Instant::now() + SWEEP_INTERVAL,
        }
    }

    /// Drops expired values and counters, at most once per [`SWEEP_INTERVAL`].
    fn sweep_expired(&mut self, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        self.next_sweep = now + SWEEP_INTERVAL;

        let before = self.values.len() + self.counters.len();
        self.values.retain(|_, (_, expires_at)| *expires_at > now);
        self.counters.retain(|_, (_, expires_at)| *expires_at > now);

        let swept = before - self.values.len() - self.counters.len();
        if swept > 0 {
            debug!("Swept {} expired entries", swept);
        }
    }
}

/// A [`FastStore`] kept in process memory.
///
/// Used when `REDIS_URL` is not configured. Nothing is shared between
/// processes and nothing survives a restart, so the staging list offers no
/// durability here. Expired values and counters are swept on write. Expiry
/// follows [`tokio::time::Instant`], which lets tests
/// drive windows with a paused clock.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        debug!("Using MemoryStore (no shared fast store)");
        Self {
            state: Mutex::new(MemoryState::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FastStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let expired = match state.values.get(key) {
            Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.values.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.sweep_expired(now);

        if ttl.is_zero() {
            state.values.remove(key);
        } else {
            state
                .values
                .insert(key.to_string(), (value, now + ttl));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.values.remove(key).is_some()
            | state.lists.remove(key).is_some()
            | state.counters.remove(key).is_some();
        Ok(removed)
    }

    async fn push_back(&self, key: &str, values: Vec<Vec<u8>>) -> StoreResult<usize> {
        let mut state = self.state.lock().await;
        let list = state.lists.entry(key.to_string()).or_default();
        list.extend(values);
        Ok(list.len())
    }

    async fn range_front(&self, key: &str, n: usize) -> StoreResult<Vec<Vec<u8>>> {
        let state = self.state.lock().await;
        Ok(state
            .lists
            .get(key)
            .map(|list| list.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim_front(&self, key: &str, n: usize) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let emptied = match state.lists.get_mut(key) {
            Some(list) => {
                let n = n.min(list.len());
                list.drain(..n);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            state.lists.remove(key);
        }
        Ok(())
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let state = self.state.lock().await;
        Ok(state.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.sweep_expired(now);

        let entry = state
            .counters
            .entry(key.to_string())
            .or_insert((0, now + window));
        if entry.1 <= now {
            *entry = (0, now + window);
        }
        entry.0 += 1;

        Ok(WindowCount {
            count: entry.0,
            ttl: entry.1.saturating_duration_since(now),
        })
    }

    async fn ping(&self) -> bool {
        true
    }
}
