//! Cache configuration options

use crate::error::ConfigError;
use crate::region::CacheRegion;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for one cache region's in-process backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Whether the region has a backend; a disabled region bypasses caching
    pub enabled: bool,
    /// Maximum number of entries in the region
    pub max_entries: usize,
    /// Maximum memory usage in bytes (approximate)
    pub max_memory_bytes: usize,
    /// Timeout applied to writes that do not pass one. Zero never expires.
    #[serde(rename = "default_timeout_secs", with = "duration_secs")]
    pub default_timeout: Duration,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            max_memory_bytes: 100 * 1024 * 1024,          // 100 MB
            default_timeout: Duration::from_secs(86_400), // 1 day
        }
    }
}

impl RegionConfig {
    /// Create a region configuration with custom settings
    pub fn new(max_entries: usize, max_memory_bytes: usize, timeout_secs: u64) -> Self {
        Self {
            enabled: true,
            max_entries,
            max_memory_bytes,
            default_timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Create a disabled region configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the maximum memory usage in bytes
    pub fn with_max_memory(mut self, max_memory_bytes: usize) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    /// Set the timeout used when a write passes none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enable or disable the region
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Process-wide cache configuration, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Region used for general query results
    pub default: RegionConfig,
    /// Region used for chart/data payloads
    pub data: RegionConfig,
    /// Record written keys against their datasource uid for later invalidation
    pub store_cache_keys: bool,
}

impl CacheConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = serde_json::from_str(contents)?;
        Ok(config)
    }

    /// Write configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Configuration of a single region
    pub fn region(&self, region: CacheRegion) -> &RegionConfig {
        match region {
            CacheRegion::Default => &self.default,
            CacheRegion::Data => &self.data,
        }
    }

    /// Replace the configuration of one region
    pub fn with_region(mut self, region: CacheRegion, config: RegionConfig) -> Self {
        match region {
            CacheRegion::Default => self.default = config,
            CacheRegion::Data => self.data = config,
        }
        self
    }

    /// Turn datasource key recording on or off
    pub fn with_store_cache_keys(mut self, enabled: bool) -> Self {
        self.store_cache_keys = enabled;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
