//! In-process LRU backend for a cache region

use crate::backend::CacheBackend;
use crate::config::RegionConfig;
use crate::error::{CacheFault, CacheResult};
use crate::stats::BackendStats;
use ahash::RandomState;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry stored in the memory backend
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    created_at: Instant,
    /// Zero means the entry never expires
    timeout: Duration,
}

impl MemoryEntry {
    fn new(value: Vec<u8>, timeout: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            timeout,
        }
    }

    fn is_expired(&self) -> bool {
        !self.timeout.is_zero() && self.created_at.elapsed() > self.timeout
    }

    fn size_bytes(&self) -> usize {
        self.value.len()
    }
}

struct MemoryState {
    entries: LruCache<String, MemoryEntry, RandomState>,
    memory_used: usize,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.pop(key)?;
        self.memory_used = self.memory_used.saturating_sub(entry.size_bytes());
        Some(entry)
    }
}

/// Thread-safe LRU backend with per-entry timeouts and a memory limit
pub struct MemoryBackend {
    name: String,
    state: RwLock<MemoryState>,
    config: RegionConfig,
    stats: Arc<BackendStats>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>, config: RegionConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            state: RwLock::new(MemoryState {
                entries: LruCache::with_hasher(capacity, RandomState::new()),
                memory_used: 0,
            }),
            config,
            stats: Arc::new(BackendStats::new()),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, RegionConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> Arc<BackendStats> {
        Arc::clone(&self.stats)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn memory_used(&self) -> usize {
        self.state.read().memory_used
    }

    /// Drop every entry
    pub fn clear(&self) {
        let evicted;
        {
            let mut state = self.state.write();
            evicted = state.entries.len() as u64;
            state.entries.clear();
            state.memory_used = 0;
        }
        for _ in 0..evicted {
            self.stats.record_eviction();
        }
        self.stats.set_entry_count(0);
        self.stats.set_memory_bytes(0);
    }

    /// Remove entries whose timeout has elapsed, returning how many were removed
    pub fn expire_stale(&self) -> usize {
        let mut state = self.state.write();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if state.remove(key).is_some() {
                self.stats.record_expiration();
            }
        }

        self.stats.set_entry_count(state.entries.len() as u64);
        self.stats.set_memory_bytes(state.memory_used as u64);
        expired.len()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut state = self.state.write();

        let expired = state.entries.get(key).map(MemoryEntry::is_expired);

        if expired == Some(false) {
            let value = state.entries.peek(key).map(|entry| entry.value.clone());
            drop(state);
            self.stats.record_hit();
            return Ok(value);
        }

        if expired == Some(true) {
            state.remove(key);
            self.stats.record_expiration();
            self.stats.set_entry_count(state.entries.len() as u64);
            self.stats.set_memory_bytes(state.memory_used as u64);
        }
        self.stats.record_miss();
        Ok(None)
    }

    fn set(&self, key: &str, value: Vec<u8>, timeout: Duration) -> CacheResult<()> {
        let entry = MemoryEntry::new(value, timeout);
        let entry_size = entry.size_bytes();

        // Oversized values are rejected rather than flushing the region
        if entry_size > self.config.max_memory_bytes {
            tracing::debug!(
                "Rejecting cache write for {} in region {}: {} bytes exceeds limit",
                key,
                self.name,
                entry_size
            );
            return Err(CacheFault::Backend(format!(
                "value of {} bytes exceeds region memory limit",
                entry_size
            )));
        }

        let mut state = self.state.write();
        state.remove(key);

        while state.memory_used + entry_size > self.config.max_memory_bytes
            && !state.entries.is_empty()
        {
            if let Some((_, evicted)) = state.entries.pop_lru() {
                state.memory_used = state.memory_used.saturating_sub(evicted.size_bytes());
                self.stats.record_eviction();
            }
        }

        if let Some((_, evicted)) = state.entries.push(key.to_string(), entry) {
            state.memory_used = state.memory_used.saturating_sub(evicted.size_bytes());
            self.stats.record_eviction();
        }
        state.memory_used += entry_size;

        let entry_count = state.entries.len() as u64;
        let mem_bytes = state.memory_used as u64;
        drop(state);

        self.stats.set_entry_count(entry_count);
        self.stats.set_memory_bytes(mem_bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut state = self.state.write();
        let removed = state.remove(key).is_some();
        if removed {
            self.stats.set_entry_count(state.entries.len() as u64);
            self.stats.set_memory_bytes(state.memory_used as u64);
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("name", &self.name)
            .field("max_entries", &self.config.max_entries)
            .field("max_memory_bytes", &self.config.max_memory_bytes)
            .field("current_entries", &self.len())
            .field("memory_used", &self.memory_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const NO_EXPIRY: Duration = Duration::ZERO;

    #[test]
    fn test_set_get() {
        let backend = MemoryBackend::with_defaults("default");
        backend.set("q1", b"payload".to_vec(), NO_EXPIRY).unwrap();

        assert_eq!(backend.get("q1").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(backend.stats().hits(), 1);
    }

    #[test]
    fn test_miss() {
        let backend = MemoryBackend::with_defaults("default");
        assert!(backend.get("missing").unwrap().is_none());
        assert_eq!(backend.stats().misses(), 1);
    }

    #[test]
    fn test_overwrite_replaces_value_and_memory() {
        let backend = MemoryBackend::with_defaults("default");
        backend.set("q1", vec![0u8; 100], NO_EXPIRY).unwrap();
        backend.set("q1", vec![0u8; 40], NO_EXPIRY).unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(backend.memory_used(), 40);
        assert_eq!(backend.get("q1").unwrap().unwrap().len(), 40);
    }

    #[test]
    fn test_delete() {
        let backend = MemoryBackend::with_defaults("default");
        backend.set("q1", b"v".to_vec(), NO_EXPIRY).unwrap();

        assert!(backend.delete("q1").unwrap());
        assert!(!backend.delete("q1").unwrap());
        assert_eq!(backend.memory_used(), 0);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let backend = MemoryBackend::new("default", RegionConfig::default().with_max_entries(3));
        for i in 0..4 {
            backend.set(&format!("q{}", i), vec![i as u8], NO_EXPIRY).unwrap();
        }

        assert_eq!(backend.len(), 3);
        assert!(backend.get("q0").unwrap().is_none());
        assert!(backend.stats().evictions() >= 1);
    }

    #[test]
    fn test_memory_limit_eviction() {
        let backend = MemoryBackend::new("default", RegionConfig::default().with_max_memory(100));
        backend.set("a", vec![0u8; 60], NO_EXPIRY).unwrap();
        backend.set("b", vec![0u8; 60], NO_EXPIRY).unwrap();

        assert_eq!(backend.len(), 1);
        assert!(backend.get("a").unwrap().is_none());
        assert!(backend.get("b").unwrap().is_some());
        assert!(backend.memory_used() <= 100);
    }

    #[test]
    fn test_oversized_value_rejected() {
        let backend = MemoryBackend::new("default", RegionConfig::default().with_max_memory(10));
        backend.set("small", vec![0u8; 4], NO_EXPIRY).unwrap();

        match backend.set("big", vec![0u8; 11], NO_EXPIRY) {
            Err(CacheFault::Backend(msg)) => {
                assert_eq!(msg, "value of 11 bytes exceeds region memory limit")
            }
            other => panic!("Expected Backend fault, got {:?}", other),
        }
        // existing entries are left alone
        assert_eq!(backend.len(), 1);
        assert!(backend.get("big").unwrap().is_none());
    }

    #[test]
    fn test_timeout_expiration() {
        let backend = MemoryBackend::with_defaults("default");
        backend.set("q1", b"v".to_vec(), Duration::from_millis(50)).unwrap();
        assert!(backend.get("q1").unwrap().is_some());

        thread::sleep(Duration::from_millis(100));

        assert!(backend.get("q1").unwrap().is_none());
        assert_eq!(backend.stats().expirations(), 1);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_expire_stale() {
        let backend = MemoryBackend::with_defaults("default");
        for i in 0..5 {
            backend.set(&format!("q{}", i), vec![i], Duration::from_millis(50)).unwrap();
        }
        backend.set("forever", b"v".to_vec(), NO_EXPIRY).unwrap();

        thread::sleep(Duration::from_millis(100));

        assert_eq!(backend.expire_stale(), 5);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_clear() {
        let backend = MemoryBackend::with_defaults("default");
        for i in 0..10 {
            backend.set(&format!("q{}", i), vec![i], NO_EXPIRY).unwrap();
        }
        backend.clear();
        assert!(backend.is_empty());
        assert_eq!(backend.memory_used(), 0);
        assert_eq!(backend.stats().evictions(), 10);
    }

    #[test]
    fn test_concurrent_access() {
        let backend = Arc::new(MemoryBackend::with_defaults("data"));
        let handles: Vec<_> = (0..10u8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    let key = format!("q{}", i);
                    backend.set(&key, vec![i], NO_EXPIRY).unwrap();
                    backend.get(&key).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(backend.len(), 10);
    }
}
