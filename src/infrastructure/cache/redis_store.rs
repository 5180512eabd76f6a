//! Redis-backed fast store.

use super::service::{FastStore, StoreError, StoreResult, WindowCount};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info};

/// Increments the counter and sets its expiry only if the key has none.
///
/// Returns `{count, pttl}`. A key left without expiry (e.g. written by an old
/// deployment) gets the window applied here as well.
const INCR_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Redis store using a shared `ConnectionManager`.
///
/// Unlike a cache that swallows errors, every method reports failures to the
/// caller: the limiter and the flusher each decide their own failure policy.
pub struct RedisStore {
    client: ConnectionManager,
    incr_window: Script,
}

impl RedisStore {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the URL is invalid, the connection
    /// cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url).map_err(|e| {
            StoreError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| StoreError::Connection(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            incr_window: Script::new(INCR_WINDOW_SCRIPT),
        })
    }
}

fn op_error(command: &str, key: &str, e: redis::RedisError) -> StoreError {
    StoreError::Operation(format!("{} {} failed: {}", command, key, e))
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl FastStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.client.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| op_error("GET", key, e))
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let millis = as_millis(ttl);
        if millis == 0 {
            self.delete(key).await?;
            return Ok(());
        }

        let mut conn = self.client.clone();
        conn.pset_ex::<_, _, ()>(key, value, millis)
            .await
            .map_err(|e| op_error("PSETEX", key, e))?;

        debug!("SET {} (TTL: {}ms)", key, millis);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.client.clone();
        let deleted = conn
            .del::<_, i64>(key)
            .await
            .map_err(|e| op_error("DEL", key, e))?;
        Ok(deleted > 0)
    }

    async fn push_back(&self, key: &str, values: Vec<Vec<u8>>) -> StoreResult<usize> {
        if values.is_empty() {
            return self.list_len(key).await;
        }

        let mut conn = self.client.clone();
        conn.rpush::<_, _, usize>(key, values)
            .await
            .map_err(|e| op_error("RPUSH", key, e))
    }

    async fn range_front(&self, key: &str, n: usize) -> StoreResult<Vec<Vec<u8>>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let stop = isize::try_from(n).unwrap_or(isize::MAX) - 1;
        let mut conn = self.client.clone();
        conn.lrange::<_, Vec<Vec<u8>>>(key, 0, stop)
            .await
            .map_err(|e| op_error("LRANGE", key, e))
    }

    async fn trim_front(&self, key: &str, n: usize) -> StoreResult<()> {
        if n == 0 {
            return Ok(());
        }

        let start = isize::try_from(n).unwrap_or(isize::MAX);
        let mut conn = self.client.clone();
        conn.ltrim::<_, ()>(key, start, -1)
            .await
            .map_err(|e| op_error("LTRIM", key, e))
    }

    async fn list_len(&self, key: &str) -> StoreResult<usize> {
        let mut conn = self.client.clone();
        conn.llen::<_, usize>(key)
            .await
            .map_err(|e| op_error("LLEN", key, e))
    }

    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        let mut conn = self.client.clone();
        let (count, ttl_ms): (u64, i64) = self
            .incr_window
            .key(key)
            .arg(as_millis(window).max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| op_error("INCR window", key, e))?;

        Ok(WindowCount {
            count,
            ttl: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn ping(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
