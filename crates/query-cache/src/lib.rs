//! Query Result Cache Sessions for Query Engine
//!
//! This crate decides, per query fingerprint, whether a previously computed
//! result can be served from a cache region, and writes fresh results back.
//!
//! # Features
//!
//! - **Regions**: Isolated `default` and `data` namespaces, each with its own backend
//! - **Sessions**: One load-or-store interaction per query with an explicit state
//! - **Fail-soft**: Misses, corrupt entries and write faults never abort a query
//! - **Statistics**: Pluggable counter sink for cache and source loads
//! - **Invalidation**: Keys can be tagged by datasource and dropped together
//!
//! # Example
//!
//! ```ignore
//! use query_cache::{CacheConfig, CacheContext, CacheRegion, LoadOptions, StoreOptions};
//!
//! let context = CacheContext::from_config(&CacheConfig::default());
//!
//! let mut session = context.load(Some(&cache_key), CacheRegion::Data, LoadOptions::new())?;
//! if !session.is_loaded() {
//!     let result = runner.run(&sql)?;
//!     session.store(Some(&cache_key), result, None, &StoreOptions::new().with_region(CacheRegion::Data));
//! }
//! ```

pub mod backend;
pub mod cached_executor;
pub mod config;
pub mod context;
pub mod error;
pub mod invalidation;
pub mod memory;
pub mod region;
pub mod session;
pub mod stats;
pub mod value;

pub use backend::CacheBackend;
pub use cached_executor::{CachedQueryExecutor, QueryRequest, QueryRunner};
pub use config::{CacheConfig, RegionConfig};
pub use context::CacheContext;
pub use error::{CacheFault, CacheLoadError, CacheResult, ConfigError};
pub use invalidation::{CacheKeyRecorder, InMemoryKeyIndex, NoOpKeyRecorder};
pub use memory::MemoryBackend;
pub use region::{CacheRegion, RegionRegistry, RegionSlot};
pub use session::{CacheHit, CacheSession, CacheState, ComputedResult, LoadOptions, StoreOptions};
pub use stats::{counters, BackendStats, CacheStats, DummyStatsLogger, StatsLogger};
pub use value::{AnnotationData, CacheValue, CachedResult, SerializedBatch};
