//! Key-value cache stores.
//!
//! [`CacheStore`] is the narrow string contract the cache-aside facade talks to.
//! [`MemoryCacheStore`] is the in-process implementation: an LRU map whose
//! entries carry both an absolute deadline and a sliding idle window.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Expiry policy attached to a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOptions {
    pub absolute_ttl: Duration,
    pub sliding_window: Duration,
}

impl From<&CacheConfig> for EntryOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            absolute_ttl: config.absolute_ttl,
            sliding_window: config.sliding_window,
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_string(
        &self,
        key: &str,
        value: String,
        options: EntryOptions,
    ) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`.
    async fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}

struct StoredEntry {
    value: String,
    absolute_deadline: Instant,
    sliding_window: Duration,
    last_access: Instant,
}

impl StoredEntry {
    /// `min(absolute deadline, last access + sliding window)`.
    fn expires_at(&self) -> Instant {
        deadline(self.last_access, self.sliding_window).min(self.absolute_deadline)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

fn deadline(from: Instant, ttl: Duration) -> Instant {
    from.checked_add(ttl)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// In-process cache store backed by an LRU map.
///
/// Expired entries are dropped lazily on read; capacity pressure evicts the
/// least recently used entry.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get_string");

        match entries.get_mut(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access = now;
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }

        entries.pop(key);
        Ok(None)
    }

    async fn set_string(
        &self,
        key: &str,
        value: String,
        options: EntryOptions,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = StoredEntry {
            value,
            absolute_deadline: deadline(now, options.absolute_ttl),
            sliding_window: options.sliding_window,
            last_access: now,
        };
        rw_write(&self.entries, SOURCE, "set_string").put(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            entries.pop(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn options(absolute: u64, sliding: u64) -> EntryOptions {
        EntryOptions {
            absolute_ttl: Duration::from_secs(absolute),
            sliding_window: Duration::from_secs(sliding),
        }
    }

    #[tokio::test]
    async fn roundtrip_and_remove() {
        let store = MemoryCacheStore::new(&CacheConfig::default());

        assert!(store.get_string("a").await.expect("get").is_none());
        store
            .set_string("a", "1".to_string(), options(600, 300))
            .await
            .expect("set");
        assert_eq!(store.get_string("a").await.expect("get").as_deref(), Some("1"));

        store.remove("a").await.expect("remove");
        assert!(store.get_string("a").await.expect("get").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entry_expires_after_sliding_window() {
        let store = MemoryCacheStore::new(&CacheConfig::default());
        store
            .set_string("a", "1".to_string(), options(600, 300))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get_string("a").await.expect("get").is_some());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(store.get_string("a").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hits_refresh_the_sliding_window_up_to_the_absolute_ttl() {
        let store = MemoryCacheStore::new(&CacheConfig::default());
        store
            .set_string("a", "1".to_string(), options(600, 300))
            .await
            .expect("set");

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(250)).await;
            assert!(store.get_string("a").await.expect("get").is_some());
        }

        // 500s elapsed, last hit at 500s: sliding would allow 800s, absolute caps at 600s.
        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(store.get_string("a").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn remove_prefix_only_touches_matching_keys() {
        let store = MemoryCacheStore::new(&CacheConfig::default());
        for key in ["builds:list:1", "builds:list:2", "builds:detail:x", "components:list:1"] {
            store
                .set_string(key, "v".to_string(), options(600, 300))
                .await
                .expect("set");
        }

        store.remove_prefix("builds:list:").await.expect("remove");

        assert!(store.get_string("builds:list:1").await.expect("get").is_none());
        assert!(store.get_string("builds:list:2").await.expect("get").is_none());
        assert!(store.get_string("builds:detail:x").await.expect("get").is_some());
        assert!(store.get_string("components:list:1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn lru_eviction_respects_capacity() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let store = MemoryCacheStore::new(&config);

        for key in ["a", "b"] {
            store
                .set_string(key, key.to_string(), options(600, 300))
                .await
                .expect("set");
        }
        // Touch `a` so `b` becomes least recently used.
        assert!(store.get_string("a").await.expect("get").is_some());
        store
            .set_string("c", "c".to_string(), options(600, 300))
            .await
            .expect("set");

        assert!(store.get_string("a").await.expect("get").is_some());
        assert!(store.get_string("b").await.expect("get").is_none());
        assert!(store.get_string("c").await.expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_ttls_saturate_instead_of_overflowing() {
        let store = MemoryCacheStore::new(&CacheConfig::default());
        store
            .set_string("a", "1".to_string(), options(u64::MAX, u64::MAX))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(3_600)).await;
        assert_eq!(store.get_string("a").await.expect("get").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = MemoryCacheStore::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store
            .set_string("a", "1".to_string(), options(600, 300))
            .await
            .expect("set");
        assert!(store.get_string("a").await.expect("get").is_some());
    }
}
