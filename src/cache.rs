//! Screenshot cache keyed by normalized URL
//!
//! The cache is an optimization, never a dependency: read failures degrade
//! to a miss and write failures are logged and swallowed. `MemoryCache` is
//! the in-process implementation; anything speaking the same trait (a
//! managed key-value store, say) can be swapped in behind it.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::ServiceError;

/// Key-value store for finished screenshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ServiceError>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), ServiceError>;
}

/// Outcome of a cache read, with the store-level error kept distinct so it
/// can be collapsed to a miss at the call site while still reaching the
/// logs.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(Vec<u8>),
    Miss,
    ReadError(ServiceError),
}

/// Query the cache, folding the three-way outcome into `CacheLookup`.
pub async fn lookup(cache: &dyn Cache, key: &str) -> CacheLookup {
    match cache.get(key).await {
        Ok(Some(bytes)) => CacheLookup::Hit(bytes),
        Ok(None) => CacheLookup::Miss,
        Err(e) => CacheLookup::ReadError(e),
    }
}

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process TTL cache backed by a concurrent map.
///
/// Expiry is lazy: stale entries are dropped when read. Concurrent writes
/// to the same key are last-write-wins, matching the external-store
/// contract.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.bytes.clone()));
            }
        }

        // Entry missing or stale; drop the stale one outside the read guard.
        if self.entries.remove_if(key, |_, e| e.expires_at <= Instant::now()).is_some() {
            debug!(key, "evicted expired cache entry");
        }

        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), ServiceError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                bytes: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
