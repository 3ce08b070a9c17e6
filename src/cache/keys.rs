//! Cache key definitions.
//!
//! A key combines the producing scope, the normalized request path and the
//! request's cache-key fragments, hashed to a fixed-size hex string.

use std::fmt;

use sha2::{Digest, Sha256};

/// Ordered `key -> value` pairs that vary a bundle per request.
///
/// Insertion order is preserved; re-inserting a key replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeyFragments {
    entries: Vec<(String, String)>,
}

impl CacheKeyFragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hex-encoded SHA-256 cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash the scope, the base key and every fragment, in insertion order.
    ///
    /// The scope names what produced the entry (a bundle's route, or the
    /// file minifier), so two producers never share a key even when their
    /// normalized paths coincide. Each component is NUL-terminated so
    /// `("ab", "c")` and `("a", "bc")` do not collide.
    pub fn compute(scope: &str, base: &str, fragments: &CacheKeyFragments) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update([0u8]);
        hasher.update(base.as_bytes());
        hasher.update([0u8]);
        for (key, value) in fragments.iter() {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a request path into the base of a cache key.
///
/// Returns `None` when there is nothing stable to key on, in which case the
/// request bypasses the cache.
pub fn base_key(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
