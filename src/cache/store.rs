//! Rendered bundle storage.

use std::{sync::Arc, sync::RwLock, time::SystemTime};

use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;

use super::{
    config::CacheConfig,
    invalidate::DependencySnapshot,
    keys::CacheKey,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::store";

/// A rendered bundle together with what it was rendered from.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Bytes,
    pub content_type: String,
    pub etag: String,
    pub last_modified: Option<SystemTime>,
    pub dependencies: DependencySnapshot,
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for rendered bundles.
///
/// Individual reads and writes must be atomic; callers treat any error as
/// "no cache" and render the bundle themselves.
pub trait AssetCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<CacheEntry>>, CacheStoreError>;
    fn put(&self, key: CacheKey, entry: Arc<CacheEntry>) -> Result<(), CacheStoreError>;
    fn remove(&self, key: &CacheKey) -> Result<(), CacheStoreError>;
}

/// In-memory LRU store.
pub struct MemoryAssetCache {
    entries: RwLock<LruCache<CacheKey, Arc<CacheEntry>>>,
}

impl MemoryAssetCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.entry_limit_non_zero())),
        }
    }

    /// Drop every cached bundle.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Get the number of cached bundles.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetCache for MemoryAssetCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<CacheEntry>>, CacheStoreError> {
        // LRU lookups reorder the list, so even reads take the write lock.
        Ok(rw_write(&self.entries, SOURCE, "get").get(key).cloned())
    }

    fn put(&self, key: CacheKey, entry: Arc<CacheEntry>) -> Result<(), CacheStoreError> {
        rw_write(&self.entries, SOURCE, "put").put(key, entry);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheStoreError> {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
        Ok(())
    }
}
