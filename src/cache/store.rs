//! Process-wide entity cache with absolute expiry.
//!
//! Entries are immutable snapshots. Expiry is checked when an entry is read,
//! and inserts sweep every expired entry at most once per TTL. Concurrent
//! misses for the same key may each run the loader, and the last insert wins.

use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use metrics::counter;
use time::OffsetDateTime;
use tracing::trace;

use crate::domain::clock::Clock;

use super::config::CacheConfig;

const METRIC_CACHE_HIT: &str = "scaffold_cache_hit_total";
const METRIC_CACHE_MISS: &str = "scaffold_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "scaffold_cache_expired_total";

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: OffsetDateTime,
}

enum Lookup<V> {
    Live(V),
    Expired,
    Absent,
}

pub struct EntityCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: time::Duration,
    clock: Arc<dyn Clock>,
    last_sweep: Mutex<OffsetDateTime>,
}

impl<K, V> EntityCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = Mutex::new(clock.now());
        Self {
            entries: DashMap::new(),
            ttl: config.ttl_span(),
            clock,
            last_sweep,
        }
    }

    /// Return a live entry. Expired entries are evicted on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        // The shard guard must be released before any removal on the same key.
        let lookup = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Lookup::Live(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Absent,
        };

        match lookup {
            Lookup::Live(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                trace!(target = "scaffold::cache", key = ?key, "cache hit");
                Some(value)
            }
            Lookup::Expired => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                counter!(METRIC_CACHE_EXPIRED).increment(1);
                counter!(METRIC_CACHE_MISS).increment(1);
                trace!(target = "scaffold::cache", key = ?key, "cache entry expired");
                None
            }
            Lookup::Absent => {
                counter!(METRIC_CACHE_MISS).increment(1);
                trace!(target = "scaffold::cache", key = ?key, "cache miss");
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.sweep_expired(now);
        let expires_at = now.saturating_add(self.ttl);
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Drop every expired entry, at most once per TTL.
    fn sweep_expired(&self, now: OffsetDateTime) {
        {
            let mut last_sweep = self
                .last_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if now - *last_sweep < self.ttl {
                return;
            }
            *last_sweep = now;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        trace!(
            target = "scaffold::cache",
            evicted = before.saturating_sub(self.entries.len()),
            "swept expired entries"
        );
    }

    /// Return the live entry or run `load`, caching a `Some` result.
    ///
    /// `None` from the loader is passed through uncached, so every miss
    /// re-runs the loader.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, load: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(Some(value));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.insert(key, value.clone());
        }
        Ok(loaded)
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use time::Duration;
    use time::macros::datetime;

    use super::*;
    use crate::domain::clock::ManualClock;

    fn cache_with_clock(ttl_secs: u64) -> (EntityCache<u32, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00:00 UTC)));
        let config = CacheConfig {
            ttl: StdDuration::from_secs(ttl_secs),
        };
        (EntityCache::new(&config, clock.clone()), clock)
    }

    #[test]
    fn entry_is_live_until_ttl_elapses() {
        let (cache, clock) = cache_with_clock(180);
        cache.insert(1, "one".into());

        clock.advance(Duration::seconds(179));
        assert_eq!(cache.get(&1).as_deref(), Some("one"));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty(), "expired entry is evicted on read");
    }

    #[test]
    fn insert_sweeps_expired_entries_that_are_never_read_again() {
        let (cache, clock) = cache_with_clock(60);
        cache.insert(1, "one".into());

        clock.advance(Duration::seconds(61));
        cache.insert(2, "two".into());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2).as_deref(), Some("two"));
    }

    #[test]
    fn sweep_runs_at_most_once_per_ttl() {
        let (cache, clock) = cache_with_clock(60);
        clock.advance(Duration::seconds(10));
        cache.insert(1, "one".into());

        // Sweeps at +60s; entry 1 is still live until +70s.
        clock.advance(Duration::seconds(50));
        cache.insert(2, "two".into());

        clock.advance(Duration::seconds(40));
        cache.insert(3, "three".into());
        assert_eq!(cache.len(), 3, "no second sweep within the TTL");

        // Entries 1 and 2 expired at +70s and +120s.
        clock.advance(Duration::seconds(21));
        cache.insert(4, "four".into());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_drops_single_and_all_entries() {
        let (cache, _) = cache_with_clock(60);
        cache.insert(1, "one".into());
        cache.insert(2, "two".into());

        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn loader_runs_once_within_ttl() {
        let (cache, _) = cache_with_clock(60);
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(7, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Some("seven".to_string()))
                })
                .await
                .expect("infallible");
            assert_eq!(value.as_deref(), Some("seven"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let (cache, _) = cache_with_clock(60);
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..2 {
            let value = cache
                .get_or_try_insert_with(9, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<Option<String>, Infallible>(None)
                })
                .await
                .expect("infallible");
            assert!(value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn loader_errors_propagate_and_leave_cache_untouched() {
        let (cache, _) = cache_with_clock(60);
        let result = cache
            .get_or_try_insert_with(3, || async { Err::<Option<String>, _>("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());
    }
}
