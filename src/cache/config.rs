//! Cache configuration.
//!
//! Controls the rendered-bundle cache via the `[cache]` table.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_ENTRY_LIMIT: usize = 256;
const DEFAULT_MAX_AGE_SECONDS: u64 = 0;

/// Cache configuration from `bundler.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store rendered bundles; when off every request re-renders.
    pub enable_cache: bool,
    /// Maximum rendered bundles kept in memory.
    pub entry_limit: usize,
    /// `max-age` sent to clients; zero asks them to revalidate every time.
    pub max_age_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            entry_limit: DEFAULT_ENTRY_LIMIT,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_cache: settings.enable_cache,
            entry_limit: settings.entry_limit,
            max_age_seconds: settings.max_age_seconds,
        }
    }
}

impl CacheConfig {
    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.entry_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Value of the `Cache-Control` header sent with bundles.
    pub fn cache_control(&self) -> String {
        if self.max_age_seconds == 0 {
            "no-cache".to_string()
        } else {
            format!("public, max-age={}", self.max_age_seconds)
        }
    }
}
