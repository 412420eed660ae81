//! Cache-key recording for datasource invalidation
//!
//! Writes that carry a datasource uid can be recorded so every key produced
//! from that datasource can later be deleted in one go.

use crate::region::CacheRegion;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Tracks which cache keys were written for which datasource
pub trait CacheKeyRecorder: Send + Sync {
    /// Remember that `key` was written for `datasource_uid` in `region`
    fn record(&self, datasource_uid: &str, key: &str, region: CacheRegion);

    /// Keys recorded for a datasource in a region
    fn keys_for(&self, datasource_uid: &str, region: CacheRegion) -> Vec<String>;

    /// Drop all recorded keys for a datasource in a region
    fn forget(&self, datasource_uid: &str, region: CacheRegion);

    /// Drop a single key from every datasource it was recorded for
    fn discard(&self, _key: &str, _region: CacheRegion) {}

    /// Whether recording is active
    fn is_enabled(&self) -> bool;
}

/// Recorder used when key storage is turned off
#[derive(Debug, Default, Clone)]
pub struct NoOpKeyRecorder;

impl CacheKeyRecorder for NoOpKeyRecorder {
    fn record(&self, _datasource_uid: &str, _key: &str, _region: CacheRegion) {}

    fn keys_for(&self, _datasource_uid: &str, _region: CacheRegion) -> Vec<String> {
        Vec::new()
    }

    fn forget(&self, _datasource_uid: &str, _region: CacheRegion) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// In-memory key index keyed by (region, datasource uid).
///
/// Keys are pruned when deleted through the context or invalidated with their
/// datasource. Keys the backend evicts or expires on its own stay recorded
/// until then, so the index is bounded by the keys written per datasource.
#[derive(Debug, Default)]
pub struct InMemoryKeyIndex {
    keys: RwLock<HashMap<(CacheRegion, String), BTreeSet<String>>>,
}

impl InMemoryKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of datasources with at least one recorded key
    pub fn datasource_count(&self) -> usize {
        self.keys.read().len()
    }
}

impl CacheKeyRecorder for InMemoryKeyIndex {
    fn record(&self, datasource_uid: &str, key: &str, region: CacheRegion) {
        self.keys
            .write()
            .entry((region, datasource_uid.to_string()))
            .or_default()
            .insert(key.to_string());
    }

    fn keys_for(&self, datasource_uid: &str, region: CacheRegion) -> Vec<String> {
        self.keys
            .read()
            .get(&(region, datasource_uid.to_string()))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn forget(&self, datasource_uid: &str, region: CacheRegion) {
        self.keys.write().remove(&(region, datasource_uid.to_string()));
    }

    fn discard(&self, key: &str, region: CacheRegion) {
        self.keys.write().retain(|(r, _), keys| {
            if *r == region {
                keys.remove(key);
            }
            !keys.is_empty()
        });
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
