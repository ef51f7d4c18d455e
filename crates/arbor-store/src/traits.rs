use std::ops::Add;

use arbor_types::{NodeKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Bitemporal tree store.
///
/// All implementations must satisfy these invariants:
/// - History is append-only: mutations close validity windows and append
///   replacement rows, nothing is physically removed.
/// - A mutation at `t` observes the state before `t` and becomes visible to
///   reads from `t + 1` onwards.
/// - Each mutation commits atomically. A failed mutation leaves every row
///   untouched and no reader ever observes a closed-but-unreplaced revision.
/// - Reads never modify stored rows, and return empty results for keys that
///   do not exist at the requested instant.
///
/// Callers apply mutations in strictly increasing timestamp order, never
/// reuse a key, and never move a node beneath one of its own descendants.
pub trait TreeStore: Send + Sync {
    /// Short label identifying the strategy in reports.
    fn name(&self) -> &'static str;

    /// Create `key` as a child of `parent` (`None` makes it a root),
    /// effective from `at`.
    ///
    /// Only the materialized-path store checks `parent`: it returns
    /// [`StoreError::UnknownNode`] when `parent` is not visible at `at`,
    /// since the child's path is built from the parent's. The other
    /// strategies record the pointer as given.
    ///
    /// [`StoreError::UnknownNode`]: crate::StoreError::UnknownNode
    fn add_node(&self, at: Timestamp, key: NodeKey, parent: Option<NodeKey>) -> StoreResult<()>;

    /// Remove `key`. Its direct children are re-attached to its former
    /// parent; deeper descendants keep the rest of their ancestry.
    fn implode_node(&self, at: Timestamp, key: NodeKey) -> StoreResult<()>;

    /// Move the subtree rooted at `key` under `new_parent`.
    ///
    /// Returns [`StoreError::ParentMismatch`] without touching any row when
    /// the stored parent of `key` differs from `old_parent`.
    ///
    /// [`StoreError::ParentMismatch`]: crate::StoreError::ParentMismatch
    fn change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<()>;

    /// Ancestors of `key` as of `at`, nearest first, ending at the root.
    fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>>;

    /// All descendants of `key` as of `at`, in no particular order.
    fn descendants(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>>;

    /// Rows and index entries currently held, across all history.
    fn footprint(&self) -> StoreResult<StorageFootprint>;

    /// The parent of `key` as of `at`.
    ///
    /// Default implementation takes the head of [`ancestors`]. Backends may
    /// override with a cheaper point lookup.
    ///
    /// [`ancestors`]: TreeStore::ancestors
    fn parent(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<NodeKey>> {
        Ok(self.ancestors(at, key)?.first().copied())
    }
}

/// Storage consumed by a store, the in-memory stand-in for a database size
/// measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFootprint {
    /// Stored rows of every table, open and closed.
    pub rows: u64,
    /// Row references held by secondary indexes.
    pub index_entries: u64,
    /// Approximate heap bytes of rows plus indexes.
    pub bytes: u64,
}

impl StorageFootprint {
    /// Size in mebibytes, the unit the results table reports.
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

impl Add for StorageFootprint {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            rows: self.rows + other.rows,
            index_entries: self.index_entries + other.index_entries,
            bytes: self.bytes + other.bytes,
        }
    }
}
