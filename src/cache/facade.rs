//! Cache-aside facade.
//!
//! Reads go through [`CacheAside::get_or_load`]: a hit is deserialised and
//! returned, a miss runs the loader and stores its result. Writes call
//! [`CacheAside::invalidate`] after the store has committed. Cache failures never
//! reach the caller: a broken read is treated as a miss, and a failed store or
//! invalidation is logged and dropped.
//!
//! Concurrent misses on one key may each run the loader; the last `set` wins.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheKey, CacheNamespace};
use super::store::{CacheStore, EntryOptions};

const METRIC_HIT: &str = "pcshop_cache_hit_total";
const METRIC_MISS: &str = "pcshop_cache_miss_total";
const METRIC_INVALIDATE_FAILED: &str = "pcshop_cache_invalidate_failed_total";

/// What a write needs cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Key(CacheKey),
    Prefix(String),
}

impl Invalidation {
    pub fn detail(namespace: CacheNamespace, id: uuid::Uuid) -> Self {
        Self::Key(CacheKey::detail(namespace, id))
    }

    pub fn lists(namespace: CacheNamespace) -> Self {
        Self::Prefix(namespace.list_prefix())
    }

    pub fn namespace(namespace: CacheNamespace) -> Self {
        Self::Prefix(namespace.prefix())
    }
}

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn default_options(&self) -> EntryOptions {
        EntryOptions::from(&self.config)
    }

    /// [`Self::get_or_load_with`] using the configured TTL and sliding window.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &CacheKey, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_load_with(key, self.default_options(), loader)
            .await
    }

    /// Return the cached value for `key`, or run `loader` and cache what it returns.
    ///
    /// Loader errors propagate unchanged and nothing is cached for them.
    pub async fn get_or_load_with<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        options: EntryOptions,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return loader().await;
        }

        let namespace = key.namespace().as_str();

        if let Some(value) = self.read::<T>(key).await {
            counter!(METRIC_HIT, "namespace" => namespace).increment(1);
            debug!(target = "pcshop::cache", key = %key, "cache hit");
            return Ok(value);
        }

        counter!(METRIC_MISS, "namespace" => namespace).increment(1);
        debug!(target = "pcshop::cache", key = %key, "cache miss");

        let value = loader().await?;
        self.write(key, &value, options).await;
        Ok(value)
    }

    async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.store.get_string(key.as_str()).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(err) => {
                warn!(
                    target = "pcshop::cache",
                    key = %key,
                    error = %err,
                    "cache read failed; falling through to loader"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "pcshop::cache",
                    key = %key,
                    error = %err,
                    "cached payload could not be decoded; treating as miss"
                );
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &CacheKey, value: &T, options: EntryOptions) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target = "pcshop::cache",
                    key = %key,
                    error = %err,
                    "value could not be encoded for caching"
                );
                return;
            }
        };

        if let Err(err) = self.store.set_string(key.as_str(), payload, options).await {
            warn!(
                target = "pcshop::cache",
                key = %key,
                error = %err,
                "cache populate failed"
            );
        }
    }

    /// Clear one key or prefix. Failures are logged and swallowed.
    pub async fn invalidate(&self, target: &Invalidation) {
        if !self.config.enabled {
            return;
        }

        let (kind, value, result) = match target {
            Invalidation::Key(key) => ("key", key.as_str(), self.store.remove(key.as_str()).await),
            Invalidation::Prefix(prefix) => (
                "prefix",
                prefix.as_str(),
                self.store.remove_prefix(prefix).await,
            ),
        };

        match result {
            Ok(()) => debug!(target = "pcshop::cache", kind, value, "cache invalidated"),
            Err(err) => {
                counter!(METRIC_INVALIDATE_FAILED).increment(1);
                warn!(
                    target = "pcshop::cache",
                    kind,
                    value,
                    error = %err,
                    "cache invalidation failed; entry may be stale until it expires"
                );
            }
        }
    }

    /// Clear every target in order. One failure does not stop the rest.
    pub async fn invalidate_all(&self, targets: &[Invalidation]) {
        for target in targets {
            self.invalidate(target).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::cache::store::{CacheError, MemoryCacheStore};

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get_string(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::unavailable("down"))
        }

        async fn set_string(
            &self,
            _key: &str,
            _value: String,
            _options: EntryOptions,
        ) -> Result<(), CacheError> {
            Err(CacheError::unavailable("down"))
        }

        async fn remove(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::unavailable("down"))
        }

        async fn remove_prefix(&self, _prefix: &str) -> Result<(), CacheError> {
            Err(CacheError::unavailable("down"))
        }
    }

    fn memory_facade() -> (CacheAside, Arc<MemoryCacheStore>) {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryCacheStore::new(&config));
        (CacheAside::new(store.clone(), config), store)
    }

    async fn counted_load(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let (cache, _) = memory_facade();
        let key = CacheKey::detail(CacheNamespace::Components, Uuid::new_v4());
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_load(&key, || counted_load(&calls, 7)).await;
        let second = cache.get_or_load(&key, || counted_load(&calls, 8)).await;

        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let (cache, store) = memory_facade();
        let key = CacheKey::detail(CacheNamespace::Builds, Uuid::new_v4());

        let failed: Result<u32, String> = cache
            .get_or_load(&key, || async { Err("missing".to_string()) })
            .await;

        assert_eq!(failed, Err("missing".to_string()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalidated_key_is_reloaded() {
        let (cache, _) = memory_facade();
        let id = Uuid::new_v4();
        let key = CacheKey::detail(CacheNamespace::Components, id);
        let calls = AtomicUsize::new(0);

        let _ = cache.get_or_load(&key, || counted_load(&calls, 1)).await;
        cache
            .invalidate(&Invalidation::detail(CacheNamespace::Components, id))
            .await;
        let reloaded = cache.get_or_load(&key, || counted_load(&calls, 2)).await;

        assert_eq!(reloaded, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn list_invalidation_spares_detail_entries() {
        let (cache, _) = memory_facade();
        let list = CacheKey::list(CacheNamespace::Builds, "page=1");
        let detail = CacheKey::detail(CacheNamespace::Builds, Uuid::new_v4());
        let calls = AtomicUsize::new(0);

        let _ = cache.get_or_load(&list, || counted_load(&calls, 1)).await;
        let _ = cache.get_or_load(&detail, || counted_load(&calls, 1)).await;
        cache
            .invalidate(&Invalidation::lists(CacheNamespace::Builds))
            .await;
        let _ = cache.get_or_load(&list, || counted_load(&calls, 1)).await;
        let _ = cache.get_or_load(&detail, || counted_load(&calls, 1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn undecodable_payload_counts_as_miss() {
        let (cache, store) = memory_facade();
        let key = CacheKey::detail(CacheNamespace::Receipts, Uuid::new_v4());
        store
            .set_string(key.as_str(), "{not json".to_string(), cache.default_options())
            .await
            .expect("seed");
        let calls = AtomicUsize::new(0);

        let value = cache.get_or_load(&key, || counted_load(&calls, 5)).await;

        assert_eq!(value, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broken_store_degrades_to_direct_loads() {
        let cache = CacheAside::new(Arc::new(BrokenStore), CacheConfig::default());
        let key = CacheKey::detail(CacheNamespace::Components, Uuid::new_v4());
        let calls = AtomicUsize::new(0);

        assert_eq!(cache.get_or_load(&key, || counted_load(&calls, 3)).await, Ok(3));
        assert_eq!(cache.get_or_load(&key, || counted_load(&calls, 4)).await, Ok(4));
        cache
            .invalidate_all(&[
                Invalidation::Key(key.clone()),
                Invalidation::namespace(CacheNamespace::Components),
            ])
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_loads() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let store = Arc::new(MemoryCacheStore::new(&config));
        let cache = CacheAside::new(store.clone(), config);
        let key = CacheKey::detail(CacheNamespace::Components, Uuid::new_v4());
        let calls = AtomicUsize::new(0);

        let _ = cache.get_or_load(&key, || counted_load(&calls, 1)).await;
        let _ = cache.get_or_load(&key, || counted_load(&calls, 1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }
}
