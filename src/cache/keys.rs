//! Cache key definitions.
//!
//! Keys are plain strings laid out as `{namespace}:{kind}:{suffix}`:
//!
//! - detail entries use the entity id as suffix (`builds:detail:<uuid>`);
//! - list entries use a digest of the canonical query string
//!   (`components:list:<16 hex chars>`).
//!
//! The list digest is the first 8 bytes of SHA-256, so two different queries can
//! in principle share a key. That is tolerated: a collision serves another
//! query's page until the entry is invalidated or expires, and every write
//! clears the whole list namespace anyway.

use std::fmt;

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Components,
    Categories,
    Builds,
    Receipts,
    Specs,
    Cart,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Components => "components",
            CacheNamespace::Categories => "categories",
            CacheNamespace::Builds => "builds",
            CacheNamespace::Receipts => "receipts",
            CacheNamespace::Specs => "specs",
            CacheNamespace::Cart => "cart",
        }
    }

    /// Prefix covering every entry in the namespace.
    pub fn prefix(self) -> String {
        format!("{}:", self.as_str())
    }

    /// Prefix covering every listing entry in the namespace.
    pub fn list_prefix(self) -> String {
        format!("{}:list:", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    value: String,
}

impl CacheKey {
    pub fn detail(namespace: CacheNamespace, id: Uuid) -> Self {
        Self {
            namespace,
            value: format!("{}:detail:{id}", namespace.as_str()),
        }
    }

    /// Key for a listing, derived from its canonical query string.
    pub fn list(namespace: CacheNamespace, canonical_query: &str) -> Self {
        Self {
            namespace,
            value: format!("{}{}", namespace.list_prefix(), hash_query(canonical_query)),
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Stable 64-bit digest of a query string, hex encoded.
///
/// Stable across processes and toolchains, so keys can be shared by every
/// instance that talks to the same store.
pub fn hash_query(canonical_query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_query.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
