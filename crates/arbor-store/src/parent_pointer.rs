use std::collections::{HashMap, HashSet};
use std::mem::size_of;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::{NodeKey, Timestamp, Validity};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::plan::{RowId, RowTable, WritePlan};
use crate::traits::{StorageFootprint, TreeStore};

/// One fact "`key` had `parent` during `validity`".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentRevision {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
    pub validity: Validity,
}

/// Append-only parent-pointer rows with key and parent indexes.
///
/// Both indexes hold every revision ever written, so each lookup filters by
/// visibility, the way an `active_at` scope would on a relational table.
/// The snapshotted strategy keeps one of these per version shard.
#[derive(Clone, Debug, Default)]
pub(crate) struct RevisionTable {
    rows: Vec<ParentRevision>,
    by_key: HashMap<NodeKey, Vec<RowId>>,
    by_parent: HashMap<NodeKey, Vec<RowId>>,
}

impl RowTable for RevisionTable {
    type Row = ParentRevision;

    fn close_row(&mut self, id: RowId, at: Timestamp) {
        self.rows[id].validity.close_at(at);
    }

    fn insert_row(&mut self, row: ParentRevision) -> RowId {
        let id = self.rows.len();
        self.by_key.entry(row.key).or_default().push(id);
        if let Some(parent) = row.parent {
            self.by_parent.entry(parent).or_default().push(id);
        }
        self.rows.push(row);
        id
    }
}

impl RevisionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The revision of `key` visible at `at`.
    pub fn active_for_key(&self, key: NodeKey, at: Timestamp) -> Option<(RowId, &ParentRevision)> {
        self.by_key
            .get(&key)?
            .iter()
            .rev()
            .map(|&id| (id, &self.rows[id]))
            .find(|(_, row)| row.validity.is_active_at(at))
    }

    /// Revisions visible at `at` whose parent is any of `parents`.
    pub fn active_children<'a>(
        &'a self,
        parents: &'a [NodeKey],
        at: Timestamp,
    ) -> impl Iterator<Item = (RowId, &'a ParentRevision)> + 'a {
        parents
            .iter()
            .filter_map(|parent| self.by_parent.get(parent))
            .flatten()
            .map(|&id| (id, &self.rows[id]))
            .filter(move |(_, row)| row.validity.is_active_at(at))
    }

    /// Walk parent pointers one point lookup at a time.
    pub fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        let mut result = Vec::new();
        let mut current = key;
        while let Some((_, row)) = self.active_for_key(current, at) {
            let Some(parent) = row.parent else { break };
            if result.len() >= self.by_key.len() {
                return Err(StoreError::CycleDetected { key, at });
            }
            result.push(parent);
            current = parent;
        }
        Ok(result)
    }

    /// Expand the subtree one level per batched children lookup.
    pub fn descendants(&self, at: Timestamp, key: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([key]);
        let mut frontier = vec![key];
        while !frontier.is_empty() {
            frontier = self
                .active_children(&frontier, at)
                .map(|(_, row)| row.key)
                .filter(|child| seen.insert(*child))
                .collect();
            result.extend_from_slice(&frontier);
        }
        result
    }

    pub fn plan_add(
        &self,
        at: Timestamp,
        key: NodeKey,
        parent: Option<NodeKey>,
    ) -> WritePlan<ParentRevision> {
        let mut plan = WritePlan::new();
        plan.insert(ParentRevision {
            key,
            parent,
            validity: Validity::open_from(at),
        });
        plan
    }

    /// Close `key` and re-point every direct child at the grandparent.
    pub fn plan_implode(
        &self,
        at: Timestamp,
        key: NodeKey,
    ) -> StoreResult<WritePlan<ParentRevision>> {
        let (node_id, node) = self
            .active_for_key(key, at)
            .ok_or(StoreError::UnknownNode { key, at })?;

        let mut plan = WritePlan::new();
        plan.close(node_id);
        for (child_id, child) in self.active_children(&[key], at) {
            plan.close(child_id);
            plan.insert(ParentRevision {
                key: child.key,
                parent: node.parent,
                validity: Validity::between(at, child.validity.until),
            });
        }
        Ok(plan)
    }

    pub fn plan_change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<WritePlan<ParentRevision>> {
        let (node_id, node) = self
            .active_for_key(key, at)
            .ok_or(StoreError::UnknownNode { key, at })?;
        if node.parent != old_parent {
            return Err(StoreError::ParentMismatch {
                key,
                expected: old_parent,
                actual: node.parent,
            });
        }

        let mut plan = WritePlan::new();
        plan.close(node_id);
        plan.insert(ParentRevision {
            key,
            parent: new_parent,
            validity: Validity::between(at, node.validity.until),
        });
        Ok(plan)
    }

    /// Copy of the revisions visible at `at`, one per key: the carried-forward
    /// contents of a new version shard.
    pub fn carry_forward(&self, at: Timestamp) -> RevisionTable {
        let mut keys: Vec<_> = self.by_key.keys().copied().collect();
        keys.sort_unstable();

        let mut shard = RevisionTable::default();
        for key in keys {
            let latest = self.by_key[&key]
                .iter()
                .map(|&id| &self.rows[id])
                .filter(|row| row.validity.is_active_at(at))
                .max_by_key(|row| row.validity.since);
            if let Some(row) = latest {
                shard.insert_row(row.clone());
            }
        }
        shard
    }

    pub fn footprint(&self) -> StorageFootprint {
        let index_entries = self.by_key.values().map(Vec::len).sum::<usize>()
            + self.by_parent.values().map(Vec::len).sum::<usize>();
        let index_keys = self.by_key.len() + self.by_parent.len();
        StorageFootprint {
            rows: self.rows.len() as u64,
            index_entries: index_entries as u64,
            bytes: (self.rows.len() * size_of::<ParentRevision>()
                + index_entries * size_of::<RowId>()
                + index_keys * size_of::<NodeKey>()) as u64,
        }
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[ParentRevision] {
        &self.rows
    }
}

/// Parent pointer plus validity interval per node revision.
///
/// Ancestor queries cost one point lookup per level and descendant queries
/// one batched lookup per level. Mutations touch at most the node and its
/// direct children.
pub struct ParentPointerStore {
    inner: RwLock<RevisionTable>,
}

impl ParentPointerStore {
    pub const NAME: &'static str = "parent_pointer";

    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RevisionTable::default()),
        }
    }

    /// Number of stored revisions, open and closed.
    pub fn revision_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, RevisionTable>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, RevisionTable>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for ParentPointerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for ParentPointerStore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_node(&self, at: Timestamp, key: NodeKey, parent: Option<NodeKey>) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_add(at, key, parent);
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
            closed = applied.closed,
            inserted = applied.inserted,
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
        plan.apply(&mut *table, at);
        debug!(strategy = Self::NAME, %key, %at, ?new_parent, "changed parent");
        Ok(())
    }

    fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        self.read()?.ancestors(at, key)
    }

    fn descendants(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        Ok(self.read()?.descendants(at, key))
    }

    fn footprint(&self) -> StoreResult<StorageFootprint> {
        Ok(self.read()?.footprint())
    }

    fn parent(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<NodeKey>> {
        Ok(self
            .read()?
            .active_for_key(key, at)
            .and_then(|(_, row)| row.parent))
    }
}

impl std::fmt::Debug for ParentPointerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.revision_count().unwrap_or_default();
        f.debug_struct("ParentPointerStore")
            .field("revision_count", &count)
            .finish()
    }
}
