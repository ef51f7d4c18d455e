use std::collections::{BTreeMap, HashMap};
use std::mem::size_of;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::{NodeKey, Timestamp, Validity};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::path::MaterializedPath;
use crate::plan::{RowId, RowTable, WritePlan};
use crate::traits::{StorageFootprint, TreeStore};

/// One fact "`key` sat at `path` during `validity`".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRevision {
    pub key: NodeKey,
    pub path: MaterializedPath,
    pub validity: Validity,
}

#[derive(Default)]
struct PathTable {
    rows: Vec<PathRevision>,
    by_key: HashMap<NodeKey, Vec<RowId>>,
    /// Ordered path index, the hierarchical index of this strategy.
    by_path: BTreeMap<String, Vec<RowId>>,
}

impl RowTable for PathTable {
    type Row = PathRevision;

    fn close_row(&mut self, id: RowId, at: Timestamp) {
        self.rows[id].validity.close_at(at);
    }

    fn insert_row(&mut self, row: PathRevision) -> RowId {
        let id = self.rows.len();
        self.by_key.entry(row.key).or_default().push(id);
        self.by_path
            .entry(row.path.as_str().to_string())
            .or_default()
            .push(id);
        self.rows.push(row);
        id
    }
}

impl PathTable {
    fn active_for_key(&self, key: NodeKey, at: Timestamp) -> Option<(RowId, &PathRevision)> {
        self.by_key
            .get(&key)?
            .iter()
            .rev()
            .map(|&id| (id, &self.rows[id]))
            .find(|(_, row)| row.validity.is_active_at(at))
    }

    fn path_of(&self, key: NodeKey, at: Timestamp) -> StoreResult<&MaterializedPath> {
        self.active_for_key(key, at)
            .map(|(_, row)| &row.path)
            .ok_or(StoreError::UnknownNode { key, at })
    }

    /// Rows strictly below `path` visible at `at`, via one range scan.
    fn active_below<'a>(
        &'a self,
        path: &MaterializedPath,
        at: Timestamp,
    ) -> impl Iterator<Item = (RowId, &'a PathRevision)> + 'a {
        self.by_path
            .range(path.descendant_range())
            .flat_map(|(_, ids)| ids.iter())
            .map(|&id| (id, &self.rows[id]))
            .filter(move |(_, row)| row.validity.is_active_at(at))
    }

    fn plan_add(
        &self,
        at: Timestamp,
        key: NodeKey,
        parent: Option<NodeKey>,
    ) -> StoreResult<WritePlan<PathRevision>> {
        let path = match parent {
            Some(parent) => self.path_of(parent, at)?.child(key),
            None => MaterializedPath::root(key),
        };
        let mut plan = WritePlan::new();
        plan.insert(PathRevision {
            key,
            path,
            validity: Validity::open_from(at),
        });
        Ok(plan)
    }

    /// Close `key` and rewrite every descendant path without it.
    fn plan_implode(&self, at: Timestamp, key: NodeKey) -> StoreResult<WritePlan<PathRevision>> {
        let (node_id, node) = self
            .active_for_key(key, at)
            .ok_or(StoreError::UnknownNode { key, at })?;

        let mut plan = WritePlan::new();
        plan.close(node_id);
        for (id, row) in self.active_below(&node.path, at) {
            plan.close(id);
            plan.insert(PathRevision {
                key: row.key,
                path: row.path.without_component(key),
                validity: Validity::between(at, row.validity.until),
            });
        }
        Ok(plan)
    }

    /// Close `key` and its whole subtree and rewrite them under the new
    /// parent's path.
    fn plan_change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<WritePlan<PathRevision>> {
        let (node_id, node) = self
            .active_for_key(key, at)
            .ok_or(StoreError::UnknownNode { key, at })?;
        let actual = node.path.parent_key();
        if actual != old_parent {
            return Err(StoreError::ParentMismatch {
                key,
                expected: old_parent,
                actual,
            });
        }

        let new_path = match new_parent {
            Some(parent) => self.path_of(parent, at)?.child(key),
            None => MaterializedPath::root(key),
        };

        let mut plan = WritePlan::new();
        for (id, row) in self.active_below(&node.path, at) {
            let Some(path) = row.path.rebase(&node.path, &new_path) else {
                continue;
            };
            plan.close(id);
            plan.insert(PathRevision {
                key: row.key,
                path,
                validity: Validity::between(at, row.validity.until),
            });
        }
        plan.close(node_id);
        plan.insert(PathRevision {
            key,
            path: new_path,
            validity: Validity::between(at, node.validity.until),
        });
        Ok(plan)
    }

    fn footprint(&self) -> StorageFootprint {
        let path_bytes: usize = self.rows.iter().map(|row| row.path.as_str().len()).sum();
        let index_key_bytes: usize = self.by_path.keys().map(String::len).sum();
        let index_entries = self.by_key.values().map(Vec::len).sum::<usize>()
            + self.by_path.values().map(Vec::len).sum::<usize>();
        StorageFootprint {
            rows: self.rows.len() as u64,
            index_entries: index_entries as u64,
            bytes: (self.rows.len() * size_of::<PathRevision>()
                + path_bytes
                + index_key_bytes
                + self.by_key.len() * size_of::<NodeKey>()
                + index_entries * size_of::<RowId>()) as u64,
        }
    }
}

/// Root-to-node path string per node revision.
///
/// Ancestors come from splitting a single row's path and descendants from a
/// single prefix range scan. Every implode or move rewrites one row per node
/// in the affected subtree, which is where this strategy pays.
pub struct MaterializedPathStore {
    inner: RwLock<PathTable>,
}

impl MaterializedPathStore {
    pub const NAME: &'static str = "materialized_path";

    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PathTable::default()),
        }
    }

    /// The path of `key` as of `at`.
    pub fn path_at(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<MaterializedPath>> {
        Ok(self
            .read()?
            .active_for_key(key, at)
            .map(|(_, row)| row.path.clone()))
    }

    /// Number of stored revisions, open and closed.
    pub fn revision_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.rows.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, PathTable>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, PathTable>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MaterializedPathStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for MaterializedPathStore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_node(&self, at: Timestamp, key: NodeKey, parent: Option<NodeKey>) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_add(at, key, parent)?;
        plan.apply(&mut *table, at);
        debug!(strategy = Self::NAME, %key, %at, "added node");
        Ok(())
    }

    fn implode_node(&self, at: Timestamp, key: NodeKey) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_implode(at, key)?;
        let applied = plan.apply(&mut *table, at);
        debug!(
            strategy = Self::NAME,
            %key,
            %at,
            rewritten = applied.inserted,
            "imploded node"
        );
        Ok(())
    }

    fn change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_change_parent(at, key, old_parent, new_parent)?;
        let applied = plan.apply(&mut *table, at);
        debug!(
            strategy = Self::NAME,
            %key,
            %at,
            ?new_parent,
            rewritten = applied.inserted,
            "changed parent"
        );
        Ok(())
    }

    fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        Ok(self
            .read()?
            .active_for_key(key, at)
            .map(|(_, row)| row.path.ancestors())
            .unwrap_or_default())
    }

    fn descendants(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        let table = self.read()?;
        let Some((_, node)) = table.active_for_key(key, at) else {
            return Ok(Vec::new());
        };
        let keys = table
            .active_below(&node.path, at)
            .map(|(_, row)| row.key)
            .collect();
        Ok(keys)
    }

    fn footprint(&self) -> StoreResult<StorageFootprint> {
        Ok(self.read()?.footprint())
    }

    fn parent(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<NodeKey>> {
        Ok(self
            .read()?
            .active_for_key(key, at)
            .and_then(|(_, row)| row.path.parent_key()))
    }
}

impl std::fmt::Debug for MaterializedPathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.revision_count().unwrap_or_default();
        f.debug_struct("MaterializedPathStore")
            .field("revision_count", &count)
            .finish()
    }
}
