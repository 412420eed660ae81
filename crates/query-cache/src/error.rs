//! Error types for cache sessions and backends

use crate::region::CacheRegion;
use thiserror::Error;

/// Faults raised at the backend / codec boundary.
///
/// None of these escape a cache session: reads degrade to a miss and writes
/// mark the session as failed.
#[derive(Debug, Error)]
pub enum CacheFault {
    /// The backend could not serve the request
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A stored entry is missing fields or cannot be decoded
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// The value could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Arrow IPC encode/decode error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Result type for backend operations
pub type CacheResult<T> = std::result::Result<T, CacheFault>;

/// Raised by `load` when a cache-only answer was required and none was usable
#[derive(Debug, Error)]
#[error("Error loading data from cache")]
pub struct CacheLoadError {
    pub key: Option<String>,
    pub region: CacheRegion,
}

impl From<CacheLoadError> for query_core::QueryError {
    fn from(err: CacheLoadError) -> Self {
        query_core::QueryError::CacheError(err.to_string())
    }
}

/// Errors raised while loading cache configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_core::QueryError;

    #[test]
    fn test_load_error_converts_to_query_error() {
        let err = CacheLoadError {
            key: Some("q1".to_string()),
            region: CacheRegion::Data,
        };
        let query_err: QueryError = err.into();
        match query_err {
            QueryError::CacheError(msg) => assert_eq!(msg, "Error loading data from cache"),
            other => panic!("Expected CacheError, got {:?}", other),
        }
    }

    #[test]
    fn test_fault_messages() {
        let fault = CacheFault::Backend("connection refused".to_string());
        assert_eq!(fault.to_string(), "Cache backend error: connection refused");

        let fault = CacheFault::CorruptEntry("missing field `payload`".to_string());
        assert!(fault.to_string().contains("payload"));
    }
}
