//! Process-wide cache context: region registry plus injected capabilities

use crate::config::CacheConfig;
use crate::error::{CacheLoadError, CacheResult};
use crate::invalidation::{CacheKeyRecorder, InMemoryKeyIndex, NoOpKeyRecorder};
use crate::region::{CacheRegion, RegionRegistry};
use crate::session::{CacheSession, LoadOptions};
use crate::stats::{counters, DummyStatsLogger, StatsLogger};
use crate::value::CacheValue;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Returns the key only when caching was requested for it
pub(crate) fn usable_key(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.is_empty())
}

/// Built once at startup and borrowed by every cache session
pub struct CacheContext {
    registry: RegionRegistry,
    stats: Arc<dyn StatsLogger>,
    key_recorder: Arc<dyn CacheKeyRecorder>,
}

impl CacheContext {
    pub fn new(registry: RegionRegistry, stats: Arc<dyn StatsLogger>) -> Self {
        Self {
            registry,
            stats,
            key_recorder: Arc::new(NoOpKeyRecorder),
        }
    }

    /// In-process backends for every enabled region, a tracing-only stats
    /// sink, and a key index when `store_cache_keys` is set
    pub fn from_config(config: &CacheConfig) -> Self {
        let context = Self::new(
            RegionRegistry::from_config(config),
            Arc::new(DummyStatsLogger),
        );
        if config.store_cache_keys {
            context.with_key_recorder(Arc::new(InMemoryKeyIndex::new()))
        } else {
            context
        }
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsLogger>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_key_recorder(mut self, recorder: Arc<dyn CacheKeyRecorder>) -> Self {
        self.key_recorder = recorder;
        self
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &dyn StatsLogger {
        self.stats.as_ref()
    }

    pub fn key_recorder(&self) -> &dyn CacheKeyRecorder {
        self.key_recorder.as_ref()
    }

    /// Shorthand for [`CacheSession::load`]
    pub fn load(
        &self,
        key: Option<&str>,
        region: CacheRegion,
        options: LoadOptions,
    ) -> Result<CacheSession<'_>, CacheLoadError> {
        CacheSession::load(self, key, region, options)
    }

    /// An empty session bound to this context
    pub fn session(&self) -> CacheSession<'_> {
        CacheSession::new(self)
    }

    /// Write `value` under `key`, stamping the write time.
    ///
    /// No-op for an empty key or a disabled region. A missing `timeout` falls
    /// back to the region's default. Encoding and backend faults are returned.
    pub fn set(
        &self,
        key: Option<&str>,
        value: CacheValue,
        timeout: Option<Duration>,
        datasource_uid: Option<&str>,
        region: CacheRegion,
    ) -> CacheResult<()> {
        let Some(key) = usable_key(key) else {
            return Ok(());
        };
        let slot = self.registry.slot(region);
        let Some(backend) = slot.backend() else {
            return Ok(());
        };

        let timeout = timeout.unwrap_or_else(|| slot.default_timeout());
        let bytes = value.stamp(Utc::now()).encode()?;
        let size = bytes.len();
        backend.set(key, bytes, timeout)?;

        debug!(
            "Cached {} bytes under {} in region {} (timeout {:?})",
            size, key, region, timeout
        );
        self.stats.incr(counters::SET_CACHE_KEY);

        if let Some(uid) = datasource_uid {
            if self.key_recorder.is_enabled() {
                self.key_recorder.record(uid, key, region);
            }
        }
        Ok(())
    }

    /// Delete `key` from the region. Backend faults are logged, not returned.
    pub fn delete(&self, key: Option<&str>, region: CacheRegion) {
        let Some(key) = usable_key(key) else {
            return;
        };
        let Some(backend) = self.registry.backend(region) else {
            return;
        };
        match backend.delete(key) {
            Ok(removed) => {
                self.key_recorder.discard(key, region);
                debug!("Deleted cache key {} in region {}: {}", key, region, removed)
            }
            Err(e) => warn!("Could not delete cache key {} in region {}: {}", key, region, e),
        }
    }

    /// Whether a non-empty entry is stored under `key`, without decoding it
    pub fn exists(&self, key: Option<&str>, region: CacheRegion) -> bool {
        let Some(key) = usable_key(key) else {
            return false;
        };
        let Some(backend) = self.registry.backend(region) else {
            return false;
        };
        match backend.get(key) {
            Ok(value) => value.is_some_and(|v| !v.is_empty()),
            Err(e) => {
                warn!("Could not check cache key {} in region {}: {}", key, region, e);
                false
            }
        }
    }

    /// Delete every key recorded for `datasource_uid` in `region`, returning
    /// how many entries were removed
    pub fn invalidate_datasource(&self, datasource_uid: &str, region: CacheRegion) -> usize {
        let keys = self.key_recorder.keys_for(datasource_uid, region);
        let Some(backend) = self.registry.backend(region) else {
            self.key_recorder.forget(datasource_uid, region);
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            match backend.delete(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not delete cache key {} in region {}: {}", key, region, e),
            }
        }
        self.key_recorder.forget(datasource_uid, region);
        debug!(
            "Invalidated {} of {} cache keys for datasource {} in region {}",
            removed,
            keys.len(),
            datasource_uid,
            region
        );
        removed
    }
}

impl std::fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContext")
            .field("registry", &self.registry)
            .field("store_cache_keys", &self.key_recorder.is_enabled())
            .finish()
    }
}
