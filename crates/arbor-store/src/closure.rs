//! Closure-table strategy.
//!
//! Every reachable (ancestor, descendant) pair is an explicit row carrying
//! its hop count. Reads become one indexed scan regardless of depth; the
//! price is paid on structural change, where whole blocks of pairs are closed
//! and recomputed.
//!
//! # Invariant
//!
//! At any instant `t`, the edges visible at `t` are exactly the transitive
//! closure of the parent relation at `t`, with `level` equal to the hop
//! distance.

use std::collections::{HashMap, HashSet};
use std::iter;
use std::mem::size_of;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::{NodeKey, Timestamp, Validity};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::plan::{RowId, RowTable, WritePlan};
use crate::traits::{StorageFootprint, TreeStore};

/// One reachable pair, `level` hops apart, during `validity`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureEdge {
    pub ancestor: NodeKey,
    pub descendant: NodeKey,
    pub level: u32,
    pub validity: Validity,
}

impl ClosureEdge {
    fn open(ancestor: NodeKey, descendant: NodeKey, level: u32, at: Timestamp) -> Self {
        Self {
            ancestor,
            descendant,
            level,
            validity: Validity::open_from(at),
        }
    }
}

#[derive(Default)]
struct ClosureTable {
    /// The nodes table: each node's lifetime, closed when it is imploded.
    nodes: Vec<Validity>,
    node_by_key: HashMap<NodeKey, RowId>,
    edges: Vec<ClosureEdge>,
    by_ancestor: HashMap<NodeKey, Vec<RowId>>,
    by_descendant: HashMap<NodeKey, Vec<RowId>>,
}

impl RowTable for ClosureTable {
    type Row = ClosureEdge;

    fn close_row(&mut self, id: RowId, at: Timestamp) {
        self.edges[id].validity.close_at(at);
    }

    fn insert_row(&mut self, edge: ClosureEdge) -> RowId {
        let id = self.edges.len();
        self.by_ancestor.entry(edge.ancestor).or_default().push(id);
        self.by_descendant.entry(edge.descendant).or_default().push(id);
        self.edges.push(edge);
        id
    }
}

impl ClosureTable {
    fn insert_node(&mut self, key: NodeKey, at: Timestamp) {
        self.node_by_key.insert(key, self.nodes.len());
        self.nodes.push(Validity::open_from(at));
    }

    fn close_node(&mut self, key: NodeKey, at: Timestamp) {
        if let Some(&id) = self.node_by_key.get(&key) {
            self.nodes[id].close_at(at);
        }
    }

    fn require_node(&self, key: NodeKey, at: Timestamp) -> StoreResult<()> {
        let live = self
            .node_by_key
            .get(&key)
            .is_some_and(|&id| self.nodes[id].is_active_at(at));
        if live {
            Ok(())
        } else {
            Err(StoreError::UnknownNode { key, at })
        }
    }

    fn visible<'a>(
        &'a self,
        index: &'a HashMap<NodeKey, Vec<RowId>>,
        key: NodeKey,
        at: Timestamp,
    ) -> impl Iterator<Item = (RowId, &'a ClosureEdge)> + 'a {
        index
            .get(&key)
            .into_iter()
            .flatten()
            .map(move |&id| (id, &self.edges[id]))
            .filter(move |(_, edge)| edge.validity.is_active_at(at))
    }

    /// Visible edges ending at `key`: its ancestors.
    fn edges_into(&self, key: NodeKey, at: Timestamp) -> Vec<(RowId, &ClosureEdge)> {
        self.visible(&self.by_descendant, key, at).collect()
    }

    /// Visible edges starting at `key`: its descendants.
    fn edges_out_of(&self, key: NodeKey, at: Timestamp) -> Vec<(RowId, &ClosureEdge)> {
        self.visible(&self.by_ancestor, key, at).collect()
    }

    fn parent_of(&self, key: NodeKey, at: Timestamp) -> Option<NodeKey> {
        self.visible(&self.by_descendant, key, at)
            .find(|(_, edge)| edge.level == 1)
            .map(|(_, edge)| edge.ancestor)
    }

    /// Visible edges from any of `ancestors` to any of `descendants`: the
    /// paths routed through the node between them.
    fn edges_between(
        &self,
        ancestors: &[(RowId, &ClosureEdge)],
        descendants: &[(RowId, &ClosureEdge)],
        at: Timestamp,
    ) -> Vec<(RowId, &ClosureEdge)> {
        let targets: HashSet<NodeKey> = descendants.iter().map(|(_, e)| e.descendant).collect();
        ancestors
            .iter()
            .flat_map(|(_, up)| self.visible(&self.by_ancestor, up.ancestor, at))
            .filter(|(_, edge)| targets.contains(&edge.descendant))
            .collect()
    }

    fn plan_add(
        &self,
        at: Timestamp,
        key: NodeKey,
        parent: Option<NodeKey>,
    ) -> WritePlan<ClosureEdge> {
        let mut plan = WritePlan::new();
        let Some(parent) = parent else {
            return plan;
        };
        for (_, up) in self.edges_into(parent, at) {
            plan.insert(ClosureEdge::open(up.ancestor, key, up.level + 1, at));
        }
        plan.insert(ClosureEdge::open(parent, key, 1, at));
        plan
    }

    /// Close every pair touching `key` and shorten the pairs routed through
    /// it by one hop.
    ///
    /// For `1 -> 2 -> {3, 4}` imploding `2`: the ancestor edge is `1->2`, the
    /// descendant edges are `2->3` and `2->4`, and the routed edges `1->3`
    /// and `1->4` come back at level 1.
    fn plan_implode(&self, at: Timestamp, key: NodeKey) -> StoreResult<WritePlan<ClosureEdge>> {
        self.require_node(key, at)?;
        let ancestors = self.edges_into(key, at);
        let descendants = self.edges_out_of(key, at);
        let through = self.edges_between(&ancestors, &descendants, at);

        let mut plan = WritePlan::new();
        for (id, _) in ancestors.iter().chain(&descendants) {
            plan.close(*id);
        }
        for (id, edge) in through {
            plan.close(id);
            plan.insert(ClosureEdge {
                level: edge.level - 1,
                validity: Validity::between(at, edge.validity.until),
                ..edge.clone()
            });
        }
        Ok(plan)
    }

    /// Detach the subtree of `key` from its old ancestors and recompute the
    /// cross product of the new parent's ancestors and the subtree.
    ///
    /// For `1 -> 2 -> {3, 4}` and `1 -> 5`, moving `2` under `5` closes
    /// `1->2`, `1->3`, `1->4` and inserts `5->2`, `5->3`, `5->4` at levels
    /// 1, 2, 2 plus `1->2`, `1->3`, `1->4` at levels 2, 3, 3. Internal
    /// subtree edges `2->3`, `2->4` stay untouched.
    fn plan_change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<WritePlan<ClosureEdge>> {
        self.require_node(key, at)?;
        let actual = self.parent_of(key, at);
        if actual != old_parent {
            return Err(StoreError::ParentMismatch {
                key,
                expected: old_parent,
                actual,
            });
        }

        let ancestors = self.edges_into(key, at);
        let descendants = self.edges_out_of(key, at);
        let old_through = self.edges_between(&ancestors, &descendants, at);

        let mut plan = WritePlan::new();
        for (id, _) in ancestors.iter().chain(&old_through) {
            plan.close(*id);
        }

        let Some(new_parent) = new_parent else {
            return Ok(plan);
        };
        let new_ancestors: Vec<(NodeKey, u32)> = self
            .edges_into(new_parent, at)
            .into_iter()
            .map(|(_, edge)| (edge.ancestor, edge.level))
            .chain(iter::once((new_parent, 0)))
            .collect();
        let subtree: Vec<(NodeKey, u32)> = descendants
            .iter()
            .map(|(_, edge)| (edge.descendant, edge.level))
            .chain(iter::once((key, 0)))
            .collect();

        for &(ancestor, up) in &new_ancestors {
            for &(descendant, down) in &subtree {
                plan.insert(ClosureEdge::open(ancestor, descendant, up + down + 1, at));
            }
        }
        Ok(plan)
    }

    fn footprint(&self) -> StorageFootprint {
        let index_entries = self.by_ancestor.values().map(Vec::len).sum::<usize>()
            + self.by_descendant.values().map(Vec::len).sum::<usize>();
        let index_keys = self.by_ancestor.len() + self.by_descendant.len() + self.node_by_key.len();
        StorageFootprint {
            rows: (self.nodes.len() + self.edges.len()) as u64,
            index_entries: index_entries as u64,
            bytes: (self.nodes.len() * (size_of::<Validity>() + size_of::<NodeKey>())
                + self.edges.len() * size_of::<ClosureEdge>()
                + index_entries * size_of::<RowId>()
                + index_keys * size_of::<NodeKey>()) as u64,
        }
    }
}

/// Explicit (ancestor, descendant, level) rows per revision.
///
/// `ancestors` and `descendants` are single index scans. `add_node` writes
/// one row per ancestor of the new node; `change_parent` writes
/// `|ancestors(new_parent)| x |subtree(key)|` rows, the known scalability
/// limit of closure tables under deep subtree moves.
pub struct ClosureTableStore {
    inner: RwLock<ClosureTable>,
}

impl ClosureTableStore {
    pub const NAME: &'static str = "closure_table";

    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ClosureTable::default()),
        }
    }

    /// Number of closure rows, open and closed.
    pub fn edge_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.edges.len())
    }

    /// Closure rows visible at `at`, ordered by (ancestor, descendant).
    pub fn edges_at(&self, at: Timestamp) -> StoreResult<Vec<ClosureEdge>> {
        let table = self.read()?;
        let mut edges: Vec<ClosureEdge> = table
            .edges
            .iter()
            .filter(|edge| edge.validity.is_active_at(at))
            .cloned()
            .collect();
        edges.sort_by_key(|edge| (edge.ancestor, edge.descendant));
        Ok(edges)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, ClosureTable>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, ClosureTable>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for ClosureTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for ClosureTableStore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_node(&self, at: Timestamp, key: NodeKey, parent: Option<NodeKey>) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_add(at, key, parent);
        table.insert_node(key, at);
        let applied = plan.apply(&mut *table, at);
        debug!(
            strategy = Self::NAME,
            %key,
            %at,
            edges = applied.inserted,
            "added node"
        );
        Ok(())
    }

    fn implode_node(&self, at: Timestamp, key: NodeKey) -> StoreResult<()> {
        let mut table = self.write()?;
        let plan = table.plan_implode(at, key)?;
        let applied = plan.apply(&mut *table, at);
        table.close_node(key, at);
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
        let applied = plan.apply(&mut *table, at);
        debug!(
            strategy = Self::NAME,
            %key,
            %at,
            ?new_parent,
            closed = applied.closed,
            inserted = applied.inserted,
            "changed parent"
        );
        Ok(())
    }

    fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        let table = self.read()?;
        let mut edges = table.edges_into(key, at);
        edges.sort_by_key(|(_, edge)| edge.level);
        let keys = edges.into_iter().map(|(_, edge)| edge.ancestor).collect();
        Ok(keys)
    }

    fn descendants(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        let table = self.read()?;
        let keys = table
            .edges_out_of(key, at)
            .into_iter()
            .map(|(_, edge)| edge.descendant)
            .collect();
        Ok(keys)
    }

    fn footprint(&self) -> StoreResult<StorageFootprint> {
        Ok(self.read()?.footprint())
    }

    fn parent(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<NodeKey>> {
        Ok(self.read()?.parent_of(key, at))
    }
}

impl std::fmt::Debug for ClosureTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.edge_count().unwrap_or_default();
        f.debug_struct("ClosureTableStore")
            .field("edge_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: u64) -> Timestamp {
        Timestamp::new(raw)
    }

    fn k(raw: u64) -> NodeKey {
        NodeKey::new(raw)
    }

    fn sorted(mut keys: Vec<NodeKey>) -> Vec<NodeKey> {
        keys.sort();
        keys
    }

    /// Visible edges as (ancestor, descendant, level) triples.
    fn triples(store: &ClosureTableStore, at: u64) -> Vec<(u64, u64, u32)> {
        store
            .edges_at(t(at))
            .unwrap()
            .into_iter()
            .map(|e| (e.ancestor.get(), e.descendant.get(), e.level))
            .collect()
    }

    /// 1 -> 2 -> {3, 4}, 1 -> 5.
    fn sample_store() -> ClosureTableStore {
        let store = ClosureTableStore::new();
        store.add_node(t(1), k(1), None).unwrap();
        store.add_node(t(2), k(2), Some(k(1))).unwrap();
        store.add_node(t(3), k(3), Some(k(2))).unwrap();
        store.add_node(t(4), k(4), Some(k(2))).unwrap();
        store.add_node(t(5), k(5), Some(k(1))).unwrap();
        store
    }

    #[test]
    fn add_node_writes_one_edge_per_ancestor() {
        let store = sample_store();
        assert_eq!(
            triples(&store, 6),
            vec![
                (1, 2, 1),
                (1, 3, 2),
                (1, 4, 2),
                (1, 5, 1),
                (2, 3, 1),
                (2, 4, 1),
            ]
        );
    }

    #[test]
    fn ancestors_ordered_by_level() {
        let store = sample_store();
        store.add_node(t(6), k(6), Some(k(3))).unwrap();
        assert_eq!(
            store.ancestors(t(7), k(6)).unwrap(),
            vec![k(3), k(2), k(1)]
        );
        assert_eq!(store.parent(t(7), k(6)).unwrap(), Some(k(3)));
    }

    #[test]
    fn implode_shortens_routed_edges() {
        let store = sample_store();
        store.implode_node(t(10), k(2)).unwrap();
        assert_eq!(
            triples(&store, 11),
            vec![(1, 3, 1), (1, 4, 1), (1, 5, 1)]
        );
        // Pre-implode closure is still there at t=10.
        assert_eq!(triples(&store, 10), triples(&store, 6));
    }

    #[test]
    fn implode_root_detaches_children() {
        let store = sample_store();
        store.implode_node(t(10), k(1)).unwrap();
        assert_eq!(triples(&store, 11), vec![(2, 3, 1), (2, 4, 1)]);
        assert!(store.ancestors(t(11), k(5)).unwrap().is_empty());
    }

    #[test]
    fn change_parent_recomputes_cross_product() {
        let store = sample_store();
        store.change_parent(t(10), k(2), Some(k(1)), Some(k(5))).unwrap();
        assert_eq!(
            triples(&store, 11),
            vec![
                (1, 2, 2),
                (1, 3, 3),
                (1, 4, 3),
                (1, 5, 1),
                (2, 3, 1),
                (2, 4, 1),
                (5, 2, 1),
                (5, 3, 2),
                (5, 4, 2),
            ]
        );
        assert_eq!(
            store.ancestors(t(11), k(3)).unwrap(),
            vec![k(2), k(5), k(1)]
        );
    }

    #[test]
    fn change_parent_to_none_keeps_subtree_edges() {
        let store = sample_store();
        store.change_parent(t(10), k(2), Some(k(1)), None).unwrap();
        assert_eq!(
            triples(&store, 11),
            vec![(1, 5, 1), (2, 3, 1), (2, 4, 1)]
        );
    }

    #[test]
    fn parent_mismatch_leaves_edges_untouched() {
        let store = sample_store();
        let before = store.edge_count().unwrap();
        let err = store
            .change_parent(t(10), k(3), Some(k(1)), Some(k(5)))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ParentMismatch {
                key: k(3),
                expected: Some(k(1)),
                actual: Some(k(2)),
            }
        );
        assert_eq!(store.edge_count().unwrap(), before);
        assert_eq!(triples(&store, 11), triples(&store, 6));
    }

    #[test]
    fn imploded_node_is_unknown_afterwards() {
        let store = sample_store();
        store.implode_node(t(10), k(2)).unwrap();
        assert_eq!(
            store.implode_node(t(11), k(2)).unwrap_err(),
            StoreError::UnknownNode { key: k(2), at: t(11) }
        );
        // The rejected implode wrote nothing.
        assert_eq!(store.edge_count().unwrap(), 6 + 2);
    }

    #[test]
    fn root_with_no_edges_still_counts_as_known() {
        let store = ClosureTableStore::new();
        store.add_node(t(1), k(1), None).unwrap();
        store.add_node(t(2), k(2), None).unwrap();
        store.change_parent(t(3), k(2), None, Some(k(1))).unwrap();
        assert_eq!(store.ancestors(t(4), k(2)).unwrap(), vec![k(1)]);
        assert_eq!(
            store.implode_node(t(5), k(9)).unwrap_err(),
            StoreError::UnknownNode { key: k(9), at: t(5) }
        );
    }

    #[test]
    fn descendants_single_scan() {
        let store = sample_store();
        assert_eq!(
            sorted(store.descendants(t(6), k(1)).unwrap()),
            vec![k(2), k(3), k(4), k(5)]
        );
        assert!(store.descendants(t(6), k(42)).unwrap().is_empty());
    }

    #[test]
    fn footprint_counts_nodes_and_edges() {
        let store = sample_store();
        let footprint = store.footprint().unwrap();
        assert_eq!(footprint.rows, 5 + 6);
        assert_eq!(footprint.index_entries, 12);
    }
}
