use arbor_types::{NodeKey, Timestamp};

/// Errors from tree store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `change_parent` was called with an old parent that disagrees with
    /// the stored current parent. Nothing was modified.
    #[error(
        "parent mismatch for node {key}: caller asserted {}, store has {}",
        display_parent(.expected),
        display_parent(.actual)
    )]
    ParentMismatch {
        key: NodeKey,
        expected: Option<NodeKey>,
        actual: Option<NodeKey>,
    },

    /// A mutation named a node that has no visible revision at `at`.
    #[error("node {key} does not exist at t={at}")]
    UnknownNode { key: NodeKey, at: Timestamp },

    /// A parent chain revisited a node. Only reachable when a caller broke
    /// the acyclicity obligation.
    #[error("parent chain of node {key} is cyclic at t={at}")]
    CycleDetected { key: NodeKey, at: Timestamp },

    /// The store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

fn display_parent(parent: &Option<NodeKey>) -> String {
    match parent {
        Some(key) => key.to_string(),
        None => "no parent".to_string(),
    }
}
