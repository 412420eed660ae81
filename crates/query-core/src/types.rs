use crate::error::QueryError;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a query computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Failed,
}

impl QueryStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, QueryStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record produced by a query executor
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub status: QueryStatus,
    /// Normalized query text that was executed
    pub query: String,
    pub applied_template_filters: Vec<String>,
    pub applied_filter_columns: Vec<String>,
    pub rejected_filter_columns: Vec<String>,
    pub error_message: Option<String>,
    pub batches: Vec<RecordBatch>,
    pub sql_rowcount: Option<u64>,
}

impl QueryResult {
    /// Successful result; the row count is taken from the batches
    pub fn success(query: impl Into<String>, batches: Vec<RecordBatch>) -> Self {
        let rows = batches.iter().map(|b| b.num_rows() as u64).sum();
        Self {
            status: QueryStatus::Success,
            query: query.into(),
            applied_template_filters: Vec::new(),
            applied_filter_columns: Vec::new(),
            rejected_filter_columns: Vec::new(),
            error_message: None,
            batches,
            sql_rowcount: Some(rows),
        }
    }

    /// Failed result carrying the error message
    pub fn failed(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Failed,
            query: query.into(),
            applied_template_filters: Vec::new(),
            applied_filter_columns: Vec::new(),
            rejected_filter_columns: Vec::new(),
            error_message: Some(message.into()),
            batches: Vec::new(),
            sql_rowcount: None,
        }
    }

    pub fn from_error(query: impl Into<String>, err: &QueryError) -> Self {
        Self::failed(query, err.to_string())
    }

    pub fn with_template_filters(mut self, filters: Vec<String>) -> Self {
        self.applied_template_filters = filters;
        self
    }

    pub fn with_applied_columns(mut self, columns: Vec<String>) -> Self {
        self.applied_filter_columns = columns;
        self
    }

    pub fn with_rejected_columns(mut self, columns: Vec<String>) -> Self {
        self.rejected_filter_columns = columns;
        self
    }

    pub fn with_rowcount(mut self, rowcount: Option<u64>) -> Self {
        self.sql_rowcount = rowcount;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }
}
