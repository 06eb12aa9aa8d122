//! Entity cache configuration.

use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Absolute lifetime of an entry, measured from insertion.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
        }
    }
}

impl CacheConfig {
    /// TTL as a `time::Duration`, saturating at the largest representable span.
    pub fn ttl_span(&self) -> time::Duration {
        time::Duration::try_from(self.ttl).unwrap_or(time::Duration::MAX)
    }
}
