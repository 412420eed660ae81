//! Cache regions and the region -> backend registry

use crate::backend::CacheBackend;
use crate::config::{CacheConfig, RegionConfig};
use crate::memory::MemoryBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Logical cache namespace. Keys in one region are invisible to the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRegion {
    #[default]
    Default,
    Data,
}

impl CacheRegion {
    pub const ALL: [CacheRegion; 2] = [CacheRegion::Default, CacheRegion::Data];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRegion::Default => "default",
            CacheRegion::Data => "data",
        }
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(CacheRegion::Default),
            "data" => Ok(CacheRegion::Data),
            other => Err(format!("Unknown cache region: {}", other)),
        }
    }
}

/// Backend assignment for one region
#[derive(Debug, Clone)]
pub struct RegionSlot {
    backend: Option<Arc<dyn CacheBackend>>,
    default_timeout: Duration,
}

impl RegionSlot {
    /// A region served by `backend`
    pub fn enabled(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            default_timeout: RegionConfig::default().default_timeout,
        }
    }

    /// A region without a backend; every operation against it is bypassed
    pub fn disabled() -> Self {
        Self {
            backend: None,
            default_timeout: Duration::ZERO,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.backend.as_ref()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// Fixed mapping from region to backend, built once at startup.
///
/// Every region gets a slot at construction, so resolving a region is a
/// plain lookup that cannot fail.
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    default: RegionSlot,
    data: RegionSlot,
}

impl RegionRegistry {
    pub fn new(default: RegionSlot, data: RegionSlot) -> Self {
        Self { default, data }
    }

    /// Build in-process backends for every enabled region
    pub fn from_config(config: &CacheConfig) -> Self {
        let slot = |region: CacheRegion| {
            let region_config = config.region(region);
            if region_config.enabled {
                let backend: Arc<dyn CacheBackend> =
                    Arc::new(MemoryBackend::new(region.as_str(), region_config.clone()));
                RegionSlot::enabled(backend).with_default_timeout(region_config.default_timeout)
            } else {
                RegionSlot::disabled()
            }
        };
        Self::new(slot(CacheRegion::Default), slot(CacheRegion::Data))
    }

    /// A registry where both regions are disabled
    pub fn disabled() -> Self {
        Self::new(RegionSlot::disabled(), RegionSlot::disabled())
    }

    pub fn slot(&self, region: CacheRegion) -> &RegionSlot {
        match region {
            CacheRegion::Default => &self.default,
            CacheRegion::Data => &self.data,
        }
    }

    /// Backend for `region`, or `None` when the region is disabled
    pub fn backend(&self, region: CacheRegion) -> Option<&Arc<dyn CacheBackend>> {
        self.slot(region).backend()
    }

    pub fn is_enabled(&self, region: CacheRegion) -> bool {
        self.backend(region).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_names() {
        assert_eq!(CacheRegion::Default.to_string(), "default");
        assert_eq!("data".parse::<CacheRegion>().unwrap(), CacheRegion::Data);
        assert!("results".parse::<CacheRegion>().is_err());
        assert_eq!(CacheRegion::default(), CacheRegion::Default);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig::default().with_region(
            CacheRegion::Data,
            RegionConfig::disabled(),
        );
        let registry = RegionRegistry::from_config(&config);

        assert!(registry.is_enabled(CacheRegion::Default));
        assert!(!registry.is_enabled(CacheRegion::Data));
        assert_eq!(
            registry.slot(CacheRegion::Default).default_timeout(),
            config.default.default_timeout
        );
    }

    #[test]
    fn test_regions_get_distinct_backends() {
        let registry = RegionRegistry::from_config(&CacheConfig::default());
        let default = registry.backend(CacheRegion::Default).unwrap();
        let data = registry.backend(CacheRegion::Data).unwrap();

        default.set("k", b"v".to_vec(), Duration::ZERO).unwrap();
        assert!(default.get("k").unwrap().is_some());
        assert!(data.get("k").unwrap().is_none());
    }

    #[test]
    fn test_disabled_registry() {
        let registry = RegionRegistry::disabled();
        for region in CacheRegion::ALL {
            assert!(registry.backend(region).is_none());
        }
    }
}
