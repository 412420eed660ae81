//! Cached query execution
//!
//! Wraps an external query runner with the load-or-compute flow: serve from
//! the cache when possible, otherwise run the query and store the result.

use crate::context::CacheContext;
use crate::region::CacheRegion;
use crate::session::{CacheSession, LoadOptions, StoreOptions};
use crate::value::AnnotationData;
use query_core::{QueryResult, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Executes queries on behalf of the cached executor
pub trait QueryRunner: Send + Sync {
    fn run(&self, query: &str) -> Result<QueryResult>;
}

/// One query to execute through the cache
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Cache key; `None` disables caching for this request
    pub cache_key: Option<String>,
    pub region: CacheRegion,
    pub force_recompute: bool,
    pub force_cache_only: bool,
    pub timeout: Option<Duration>,
    pub datasource_uid: Option<String>,
    pub annotation_data: Option<AnnotationData>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_region(mut self, region: CacheRegion) -> Self {
        self.region = region;
        self
    }

    pub fn with_force_recompute(mut self, force: bool) -> Self {
        self.force_recompute = force;
        self
    }

    pub fn with_force_cache_only(mut self, force: bool) -> Self {
        self.force_cache_only = force;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_datasource_uid(mut self, uid: impl Into<String>) -> Self {
        self.datasource_uid = Some(uid.into());
        self
    }

    pub fn with_annotation_data(mut self, data: AnnotationData) -> Self {
        self.annotation_data = Some(data);
        self
    }
}

/// A query runner with cache-session support
pub struct CachedQueryExecutor<R: QueryRunner> {
    runner: R,
    context: Arc<CacheContext>,
}

impl<R: QueryRunner> CachedQueryExecutor<R> {
    pub fn new(runner: R, context: Arc<CacheContext>) -> Self {
        Self { runner, context }
    }

    pub fn context(&self) -> &Arc<CacheContext> {
        &self.context
    }

    /// Serve `request` from the cache or run it.
    ///
    /// Executor errors are recorded on the returned session as a failed
    /// result. The only error returned is a cache-only request that missed.
    pub fn execute(&self, request: &QueryRequest) -> Result<CacheSession<'_>> {
        let key = request.cache_key.as_deref();
        let load_options = LoadOptions::new()
            .with_force_recompute(request.force_recompute)
            .with_force_cache_only(request.force_cache_only);

        let mut session = CacheSession::load(&self.context, key, request.region, load_options)?;
        if session.is_loaded() {
            return Ok(session);
        }

        debug!("Running query for cache key {:?}", key);
        let result = self
            .runner
            .run(&request.query)
            .unwrap_or_else(|e| QueryResult::from_error(request.query.as_str(), &e));

        let store_options = StoreOptions {
            force_recompute: request.force_recompute,
            timeout: request.timeout,
            datasource_uid: request.datasource_uid.clone(),
            region: request.region,
        };
        session.store(key, result, request.annotation_data.clone(), &store_options);
        Ok(session)
    }

    /// Run without touching the cache
    pub fn execute_uncached(&self, query: &str) -> Result<QueryResult> {
        self.runner.run(query)
    }

    /// Remove a cached entry
    pub fn invalidate(&self, key: &str, region: CacheRegion) {
        self.context.delete(Some(key), region);
    }
}
