use std::path::PathBuf;

use arbor_store::StoreError;
use arbor_types::{NodeKey, Timestamp};
use arbor_workload::Query;

/// Failures that abort a replay run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// A store call returned an error.
    #[error("{operation} at t={timestamp} failed: {source}")]
    Store {
        operation: &'static str,
        timestamp: Timestamp,
        #[source]
        source: StoreError,
    },

    /// A query returned something other than the recorded answer.
    #[error("{} of node {} at t={timestamp}: expected {expected:?}, got {actual:?}", .query.label(), .query.key())]
    CheckFailed {
        timestamp: Timestamp,
        query: Query,
        expected: Vec<NodeKey>,
        actual: Vec<NodeKey>,
    },
}

/// Errors reading or writing the results book.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("results file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("results json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors loading a benchmark configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
