use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("Cache error: {0}")]
    CacheError(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = QueryError::ExecutionError("division by zero".to_string());
        assert_eq!(err.to_string(), "Execution error: division by zero");

        let err = QueryError::CacheError("Error loading data from cache".to_string());
        assert_eq!(err.to_string(), "Cache error: Error loading data from cache");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err: QueryError = io.into();
        assert!(matches!(err, QueryError::IoError(_)));
    }
}
