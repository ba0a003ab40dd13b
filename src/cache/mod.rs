//! Cache-aside layer
//!
//! Every paginated and detail read in the catalog goes through [`CacheAside`];
//! every write clears the keys and namespaces its change could appear in.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! absolute_ttl_seconds = 600
//! sliding_seconds = 300
//! capacity = 1024
//! ```

mod config;
mod facade;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use facade::{CacheAside, Invalidation};
pub use keys::{CacheKey, CacheNamespace, hash_query};
pub use store::{CacheError, CacheStore, EntryOptions, MemoryCacheStore};
