//! Error types for workload generation and workload files.

use std::path::PathBuf;

use arbor_types::NodeKey;

/// Errors that can occur while building, replaying or storing workloads.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// A mutation referenced a node the model does not hold.
    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),

    /// Attempted to add a node whose key is already live.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeKey),

    /// A recorded re-parent names an old parent the model disagrees with.
    #[error("recorded old parent of node {key} is {recorded:?}, model has {actual:?}")]
    ParentMismatch {
        key: NodeKey,
        recorded: Option<NodeKey>,
        actual: Option<NodeKey>,
    },

    /// A re-parent would place a node beneath itself.
    #[error("moving node {key} under {new_parent} would create a cycle")]
    CycleDetected { key: NodeKey, new_parent: NodeKey },

    /// Reading or writing a workload file failed.
    #[error("workload file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("json codec: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("binary codec: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Convenience alias for workload results.
pub type WorkloadResult<T> = Result<T, WorkloadError>;
