//! Bundle cache.
//!
//! Rendered bundles are kept in an in-memory LRU store keyed by a hash of
//! the request path and the request's cache-key fragments. Entries carry a
//! snapshot of their source files and are discarded as soon as any of them
//! changes on disk.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_cache = true
//! entry_limit = 256
//! max_age_seconds = 0
//! ```

mod config;
mod invalidate;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use invalidate::{Dependency, DependencySnapshot};
pub use keys::{CacheKey, CacheKeyFragments, base_key};
pub use store::{AssetCache, CacheEntry, CacheStoreError, MemoryAssetCache};
