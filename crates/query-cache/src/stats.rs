//! Cache statistics: the counter sink used by sessions and backend counters

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counter names emitted by cache sessions
pub mod counters {
    /// A usable entry was found in the backend
    pub const LOADING_FROM_CACHE: &str = "loading_from_cache";
    /// The entry was decoded into the session
    pub const LOADED_FROM_CACHE: &str = "loaded_from_cache";
    /// A fresh, non-failed computation result was stored in the session
    pub const LOADED_FROM_SOURCE: &str = "loaded_from_source";
    /// Same as above, when the caller did not force recomputation
    pub const LOADED_FROM_SOURCE_WITHOUT_FORCE: &str = "loaded_from_source_without_force";
    /// A value was written to a backend
    pub const SET_CACHE_KEY: &str = "set_cache_key";
}

/// Metrics sink injected into the cache context.
///
/// Calls are fire-and-forget: implementations must not block or fail.
pub trait StatsLogger: Send + Sync {
    fn incr(&self, key: &str);

    fn decr(&self, _key: &str) {}

    fn timing(&self, _key: &str, _value: Duration) {}

    fn gauge(&self, _key: &str, _value: f64) {}
}

/// Sink that only traces counter names
#[derive(Debug, Default, Clone)]
pub struct DummyStatsLogger;

impl StatsLogger for DummyStatsLogger {
    fn incr(&self, key: &str) {
        tracing::trace!("[stats_logger] (incr) {}", key);
    }

    fn decr(&self, key: &str) {
        tracing::trace!("[stats_logger] (decr) {}", key);
    }

    fn timing(&self, key: &str, value: Duration) {
        tracing::trace!("[stats_logger] (timing) {} | {:?}", key, value);
    }

    fn gauge(&self, key: &str, value: f64) {
        tracing::trace!("[stats_logger] (gauge) {} | {}", key, value);
    }
}

/// In-memory counter sink
#[derive(Debug, Default)]
pub struct CacheStats {
    counters: DashMap<String, i64>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (zero if never touched)
    pub fn get(&self, key: &str) -> i64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    /// Results served from the cache
    pub fn loaded_from_cache(&self) -> i64 {
        self.get(counters::LOADED_FROM_CACHE)
    }

    /// Results computed by the executor
    pub fn loaded_from_source(&self) -> i64 {
        self.get(counters::LOADED_FROM_SOURCE)
    }

    /// Share of served results that came from the cache (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.loaded_from_cache() as f64;
        let total = hits + self.loaded_from_source() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.counters.clear();
    }

    fn add(&self, key: &str, delta: i64) {
        *self.counters.entry(key.to_string()).or_insert(0) += delta;
    }
}

impl StatsLogger for CacheStats {
    fn incr(&self, key: &str) {
        self.add(key, 1);
    }

    fn decr(&self, key: &str) {
        self.add(key, -1);
    }
}

/// Counters maintained by the in-process backend
#[derive(Debug, Default)]
pub struct BackendStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// Entries dropped because their timeout elapsed
    expirations: AtomicU64,
    entry_count: AtomicU64,
    memory_bytes: AtomicU64,
}

impl BackendStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an expired entry
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the current entry count
    pub fn set_entry_count(&self, count: u64) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    /// Update the current memory usage
    pub fn set_memory_bytes(&self, bytes: u64) {
        self.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total expirations
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Get current entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Get current memory usage in bytes
    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}
