//! Cache session: one load-or-store interaction for one query
//!
//! A session starts [`CacheState::Empty`] and is populated once, either from
//! a backend entry by [`CacheSession::load`] or from a fresh computation by
//! [`CacheSession::store`]. Backend faults never escape a session; the only
//! error surfaced is [`CacheLoadError`] for cache-only loads that miss.

use crate::context::{usable_key, CacheContext};
use crate::error::{CacheFault, CacheLoadError, CacheResult};
use crate::region::CacheRegion;
use crate::stats::counters;
use crate::value::{AnnotationData, CacheValue, CachedResult};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use query_core::{QueryResult, QueryStatus};
use std::backtrace::Backtrace;
use std::time::Duration;
use tracing::{debug, error, warn};

static EMPTY_ANNOTATIONS: AnnotationData = AnnotationData::new();

/// Caller directives for [`CacheSession::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip the cache read entirely
    pub force_recompute: bool,
    /// Fail unless the result is served from the cache
    pub force_cache_only: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass the cache
    pub fn with_force_recompute(mut self, force: bool) -> Self {
        self.force_recompute = force;
        self
    }

    /// Require the result to come from the cache
    pub fn with_force_cache_only(mut self, force: bool) -> Self {
        self.force_cache_only = force;
        self
    }
}

/// Write parameters for [`CacheSession::store`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// The result was recomputed on the caller's request
    pub force_recompute: bool,
    /// Entry timeout; the region default applies when unset
    pub timeout: Option<Duration>,
    /// Datasource the result was computed from, used to tag the key
    pub datasource_uid: Option<String>,
    pub region: CacheRegion,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the result as recomputed on the caller's request
    pub fn with_force_recompute(mut self, force: bool) -> Self {
        self.force_recompute = force;
        self
    }

    /// Set the entry timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tag the written key with a datasource
    pub fn with_datasource_uid(mut self, uid: impl Into<String>) -> Self {
        self.datasource_uid = Some(uid.into());
        self
    }

    /// Choose the region to write to
    pub fn with_region(mut self, region: CacheRegion) -> Self {
        self.region = region;
        self
    }
}

/// Entry read from a backend
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub result: CachedResult,
    /// Bytes exactly as they were read
    pub raw: Vec<u8>,
}

/// Result handed over by the executor, plus write-through diagnostics
#[derive(Debug, Clone)]
pub struct ComputedResult {
    pub status: QueryStatus,
    pub value: CacheValue,
    pub error_message: Option<String>,
    pub stacktrace: Option<String>,
}

impl ComputedResult {
    fn new(result: QueryResult, annotation_data: AnnotationData) -> Self {
        Self {
            status: result.status,
            value: CacheValue {
                payload: result.batches,
                query: result.query,
                applied_template_filters: result.applied_template_filters,
                applied_filter_columns: result.applied_filter_columns,
                rejected_filter_columns: result.rejected_filter_columns,
                annotation_data,
                sql_rowcount: result.sql_rowcount,
            },
            error_message: result.error_message,
            stacktrace: None,
        }
    }

    /// Whether the result can be served, i.e. it did not fail
    pub fn is_loaded(&self) -> bool {
        !self.status.is_failed()
    }

    /// Record a write-through fault. An existing error message is kept.
    fn mark_failed(&mut self, fault: &CacheFault) {
        if self.error_message.as_deref().map_or(true, str::is_empty) {
            self.error_message = Some(fault.to_string());
        }
        self.status = QueryStatus::Failed;
        self.stacktrace = Some(Backtrace::force_capture().to_string());
    }
}

/// What a session currently holds
#[derive(Debug, Clone, Default)]
pub enum CacheState {
    #[default]
    Empty,
    LoadedFromCache(CacheHit),
    LoadedFromComputation(ComputedResult),
}

/// Per-query cache session bound to a [`CacheContext`]
#[derive(Debug)]
pub struct CacheSession<'a> {
    context: &'a CacheContext,
    state: CacheState,
}

impl<'a> CacheSession<'a> {
    /// An empty session
    pub fn new(context: &'a CacheContext) -> Self {
        Self {
            context,
            state: CacheState::Empty,
        }
    }

    /// Look `key` up in `region`.
    ///
    /// An empty key, `force_recompute`, or a disabled region return an empty
    /// session without touching the backend. Misses, read faults and corrupt
    /// entries also leave the session empty. Only a miss under
    /// `force_cache_only` is an error.
    pub fn load(
        context: &'a CacheContext,
        key: Option<&str>,
        region: CacheRegion,
        options: LoadOptions,
    ) -> Result<Self, CacheLoadError> {
        let mut session = Self::new(context);

        let Some(key) = usable_key(key) else {
            return Ok(session);
        };
        if options.force_recompute {
            return Ok(session);
        }
        let Some(backend) = context.registry().backend(region) else {
            return Ok(session);
        };

        match backend.get(key) {
            Ok(Some(raw)) => {
                debug!("Cache key: {}", key);
                context.stats().incr(counters::LOADING_FROM_CACHE);
                match CachedResult::decode(&raw) {
                    Ok(result) => {
                        session.state = CacheState::LoadedFromCache(CacheHit { result, raw });
                        context.stats().incr(counters::LOADED_FROM_CACHE);
                    }
                    Err(e) => error!("Error reading cache: {}", e),
                }
                debug!("Serving from cache");
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for key {} in region {}: {}", key, region, e),
        }

        if options.force_cache_only && !session.is_loaded() {
            warn!("force_cached: value not found for key {}", key);
            return Err(CacheLoadError {
                key: Some(key.to_string()),
                region,
            });
        }
        Ok(session)
    }

    /// Populate the session from a fresh computation and write it through.
    ///
    /// Failed results are never written. A fault while writing is logged and
    /// turns the session into a failed one; it is never returned.
    pub fn store(
        &mut self,
        key: Option<&str>,
        result: QueryResult,
        annotation_data: Option<AnnotationData>,
        options: &StoreOptions,
    ) {
        let mut computed = ComputedResult::new(result, annotation_data.unwrap_or_default());

        if computed.is_loaded() {
            self.context.stats().incr(counters::LOADED_FROM_SOURCE);
            if !options.force_recompute {
                self.context
                    .stats()
                    .incr(counters::LOADED_FROM_SOURCE_WITHOUT_FORCE);
            }
        }

        if let Err(fault) = self.write_through(key, &computed, options) {
            error!(
                "Failed to cache query result for key {}: {}",
                key.unwrap_or_default(),
                fault
            );
            computed.mark_failed(&fault);
        }

        self.state = CacheState::LoadedFromComputation(computed);
    }

    fn write_through(
        &self,
        key: Option<&str>,
        computed: &ComputedResult,
        options: &StoreOptions,
    ) -> CacheResult<()> {
        if !computed.is_loaded() || usable_key(key).is_none() {
            return Ok(());
        }
        self.context.set(
            key,
            computed.value.clone(),
            options.timeout,
            options.datasource_uid.as_deref(),
            options.region,
        )
    }

    /// Context the session is bound to
    pub fn context(&self) -> &'a CacheContext {
        self.context
    }

    /// Current session state
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Consume the session, keeping its state
    pub fn into_state(self) -> CacheState {
        self.state
    }

    /// `None` while the session is empty
    pub fn status(&self) -> Option<QueryStatus> {
        match &self.state {
            CacheState::Empty => None,
            CacheState::LoadedFromCache(_) => Some(QueryStatus::Success),
            CacheState::LoadedFromComputation(computed) => Some(computed.status),
        }
    }

    /// A usable result is held
    pub fn is_loaded(&self) -> bool {
        match &self.state {
            CacheState::Empty => false,
            CacheState::LoadedFromCache(_) => true,
            CacheState::LoadedFromComputation(computed) => computed.is_loaded(),
        }
    }

    /// The held result came from the backend
    pub fn is_cached(&self) -> bool {
        matches!(self.state, CacheState::LoadedFromCache(_))
    }

    /// When the cached record was written
    pub fn cache_timestamp(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CacheState::LoadedFromCache(hit) => Some(hit.result.dttm),
            _ => None,
        }
    }

    /// Raw bytes of the backend entry the session was loaded from
    pub fn cache_value(&self) -> Option<&[u8]> {
        match &self.state {
            CacheState::LoadedFromCache(hit) => Some(&hit.raw),
            _ => None,
        }
    }

    /// Error message of a failed computation or write
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            CacheState::LoadedFromComputation(computed) => computed.error_message.as_deref(),
            _ => None,
        }
    }

    /// Backtrace captured when a write failed
    pub fn stacktrace(&self) -> Option<&str> {
        match &self.state {
            CacheState::LoadedFromComputation(computed) => computed.stacktrace.as_deref(),
            _ => None,
        }
    }

    fn value(&self) -> Option<&CacheValue> {
        match &self.state {
            CacheState::Empty => None,
            CacheState::LoadedFromCache(hit) => Some(&hit.result.value),
            CacheState::LoadedFromComputation(computed) => Some(&computed.value),
        }
    }

    /// Result batches; empty while the session is empty
    pub fn payload(&self) -> &[RecordBatch] {
        self.value().map(|v| v.payload.as_slice()).unwrap_or(&[])
    }

    /// Executed query text
    pub fn query(&self) -> &str {
        self.value().map(|v| v.query.as_str()).unwrap_or("")
    }

    /// Template filters applied to the query
    pub fn applied_template_filters(&self) -> &[String] {
        self.value()
            .map(|v| v.applied_template_filters.as_slice())
            .unwrap_or(&[])
    }

    /// Filter columns applied to the query
    pub fn applied_filter_columns(&self) -> &[String] {
        self.value()
            .map(|v| v.applied_filter_columns.as_slice())
            .unwrap_or(&[])
    }

    /// Filter columns the query could not apply
    pub fn rejected_filter_columns(&self) -> &[String] {
        self.value()
            .map(|v| v.rejected_filter_columns.as_slice())
            .unwrap_or(&[])
    }

    /// Annotation layers stored with the result
    pub fn annotation_data(&self) -> &AnnotationData {
        self.value()
            .map(|v| &v.annotation_data)
            .unwrap_or(&EMPTY_ANNOTATIONS)
    }

    /// Row count reported by the executor
    pub fn sql_rowcount(&self) -> Option<u64> {
        self.value().and_then(|v| v.sql_rowcount)
    }
}
