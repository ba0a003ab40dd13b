//! Cache configuration.
//!
//! Controls the cache-aside layer via the `[cache]` settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_ABSOLUTE_TTL_SECS: u64 = 600;
const DEFAULT_SLIDING_SECS: u64 = 300;
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, every read goes straight to the loader and nothing is stored.
    pub enabled: bool,
    /// Hard upper bound on an entry's lifetime, counted from population.
    pub absolute_ttl: Duration,
    /// Idle window; each hit pushes expiry out by this much, capped by `absolute_ttl`.
    pub sliding_window: Duration,
    /// Maximum entries held by the in-process store before LRU eviction.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            absolute_ttl: Duration::from_secs(DEFAULT_ABSOLUTE_TTL_SECS),
            sliding_window: Duration::from_secs(DEFAULT_SLIDING_SECS),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            absolute_ttl: settings.absolute_ttl,
            sliding_window: settings.sliding_window,
            capacity: settings.capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Longest a populated entry can stay readable without being refreshed.
    pub fn staleness_bound(&self) -> Duration {
        self.absolute_ttl.max(self.sliding_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.absolute_ttl, Duration::from_secs(600));
        assert_eq!(config.sliding_window, Duration::from_secs(300));
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.staleness_bound(), Duration::from_secs(600));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
