//! TTL-bound key → JSON-blob cache backends.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use roost_core::{HostError, HostResult};

/// Resolution cache primitives.
///
/// Values are opaque JSON blobs; expiry is the backend's job. Invalidating a
/// key that does not exist is a no-op.
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    /// Read a live entry. Expired entries count as misses.
    async fn get(&self, key: &str) -> HostResult<Option<String>>;

    /// Write an entry with a TTL.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> HostResult<()>;

    /// Delete an entry.
    async fn invalidate(&self, key: &str) -> HostResult<()>;
}

/// In-memory TTL cache for tests and development.
///
/// Expired entries are evicted lazily on read.
pub struct MemoryResolutionCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

struct CachedEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryResolutionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entries, counting not-yet-evicted expired ones.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Test helper: force an entry past its expiry.
    pub fn expire_now(&self, key: &str) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }
}

impl Default for MemoryResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolutionCache for MemoryResolutionCache {
    async fn get(&self, key: &str) -> HostResult<Option<String>> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Entry exists but is stale: evict it.
        self.entries.write().remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> HostResult<()> {
        self.entries.write().insert(
            key.to_string(),
            CachedEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> HostResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Redis-backed resolution cache.
#[cfg(feature = "redis")]
pub struct RedisResolutionCache {
    conn: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis")]
impl RedisResolutionCache {
    /// Connect to a Redis instance.
    pub async fn connect(url: &str) -> HostResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| HostError::storage_source("invalid redis url", e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| HostError::storage_source("redis connection failed", e))?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl ResolutionCache for RedisResolutionCache {
    async fn get(&self, key: &str) -> HostResult<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| HostError::storage_source(format!("redis get failed for '{}'", key), e))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> HostResult<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| HostError::storage_source(format!("redis set failed for '{}'", key), e))
    }

    async fn invalidate(&self, key: &str) -> HostResult<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| HostError::storage_source(format!("redis del failed for '{}'", key), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_invalidate_roundtrip() {
        let cache = MemoryResolutionCache::new();
        cache
            .put("k1", "{\"a\":1}", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("{\"a\":1}"));
        cache.invalidate("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = MemoryResolutionCache::new();
        cache
            .put("k1", "v", Duration::from_secs(60))
            .await
            .unwrap();
        cache.expire_now("k1");

        assert_eq!(cache.get("k1").await.unwrap(), None);
        // Lazy eviction removed the stale entry.
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn invalidating_a_missing_key_is_a_noop() {
        let cache = MemoryResolutionCache::new();
        cache.invalidate("never-set").await.unwrap();
        cache.invalidate("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn last_writer_wins_on_overwrite() {
        let cache = MemoryResolutionCache::new();
        cache.put("k1", "old", Duration::from_secs(60)).await.unwrap();
        cache.put("k1", "new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("new"));
    }
}
