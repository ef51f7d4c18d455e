//! Parent pointers partitioned into version shards.
//!
//! Each shard is a point-in-time replica of the revisions that were visible
//! when it was created, followed by the revisions written while it was
//! current. Reads only scan the shard serving their instant, which bounds the
//! history they wade through at the cost of copying the whole live tree every
//! time a shard is opened.

use std::mem::size_of;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::{NodeKey, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::parent_pointer::{ParentRevision, RevisionTable};
use crate::plan::WritePlan;
use crate::traits::{StorageFootprint, TreeStore};

/// Identifier of a version shard, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionId(pub u64);

struct Shard {
    version: VersionId,
    created_at: Timestamp,
    table: RevisionTable,
}

struct ShardedState {
    /// Ordered by `created_at`; the side table of versions.
    shards: Vec<Shard>,
    /// Index of the shard receiving writes.
    current: usize,
    last_snapshot: Timestamp,
}

impl ShardedState {
    fn new() -> Self {
        Self {
            shards: vec![Shard {
                version: VersionId(0),
                created_at: Timestamp::ZERO,
                table: RevisionTable::default(),
            }],
            current: 0,
            last_snapshot: Timestamp::ZERO,
        }
    }

    /// The latest shard created strictly before `at`.
    fn serving(&self, at: Timestamp) -> &Shard {
        let index = self
            .shards
            .partition_point(|shard| shard.created_at < at)
            .saturating_sub(1);
        &self.shards[index]
    }

    fn footprint(&self) -> StorageFootprint {
        let side_table = StorageFootprint {
            rows: self.shards.len() as u64,
            index_entries: 0,
            bytes: (self.shards.len() * (size_of::<VersionId>() + size_of::<Timestamp>())) as u64,
        };
        self.shards
            .iter()
            .map(|shard| shard.table.footprint())
            .fold(side_table, |total, shard| total + shard)
    }
}

/// Parent-pointer revisions tagged with a version shard.
///
/// A mutation arriving more than `threshold` ticks after the last snapshot
/// first opens a new shard holding a copy of every key's visible revision,
/// then applies itself to that shard. Shard creation, the mutation, and the
/// move of the current-version pointer commit under one write lock.
pub struct SnapshottedParentPointerStore {
    threshold: u64,
    inner: RwLock<ShardedState>,
}

impl SnapshottedParentPointerStore {
    pub const NAME: &'static str = "parent_pointer_snapshots";

    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            inner: RwLock::new(ShardedState::new()),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.snapshot_threshold)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Number of version shards, the initial one included.
    pub fn version_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.shards.len())
    }

    /// The shard currently receiving writes.
    pub fn current_version(&self) -> StoreResult<VersionId> {
        let state = self.read()?;
        Ok(state.shards[state.current].version)
    }

    /// The shard a read at `at` resolves to.
    pub fn version_at(&self, at: Timestamp) -> StoreResult<VersionId> {
        Ok(self.read()?.serving(at).version)
    }

    /// Plan a mutation against the right shard and commit it, opening a new
    /// shard first when the threshold has elapsed.
    fn mutate<F>(&self, at: Timestamp, plan_for: F) -> StoreResult<()>
    where
        F: FnOnce(&RevisionTable) -> StoreResult<WritePlan<ParentRevision>>,
    {
        let mut state = self.write()?;

        if at.since(state.last_snapshot) > self.threshold {
            let mut table = state.serving(at).table.carry_forward(at);
            let plan = plan_for(&table)?;
            let carried = table.len();
            plan.apply(&mut table, at);

            let version = VersionId(state.shards.len() as u64);
            state.shards.push(Shard {
                version,
                created_at: at,
                table,
            });
            state.current = state.shards.len() - 1;
            state.last_snapshot = at;
            info!(
                strategy = Self::NAME,
                version = version.0,
                %at,
                carried,
                "opened version shard"
            );
        } else {
            let current = state.current;
            let table = &mut state.shards[current].table;
            let plan = plan_for(&*table)?;
            plan.apply(table, at);
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, ShardedState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, ShardedState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for SnapshottedParentPointerStore {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl TreeStore for SnapshottedParentPointerStore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_node(&self, at: Timestamp, key: NodeKey, parent: Option<NodeKey>) -> StoreResult<()> {
        self.mutate(at, |table| Ok(table.plan_add(at, key, parent)))?;
        debug!(strategy = Self::NAME, %key, %at, "added node");
        Ok(())
    }

    fn implode_node(&self, at: Timestamp, key: NodeKey) -> StoreResult<()> {
        self.mutate(at, |table| table.plan_implode(at, key))?;
        debug!(strategy = Self::NAME, %key, %at, "imploded node");
        Ok(())
    }

    fn change_parent(
        &self,
        at: Timestamp,
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    ) -> StoreResult<()> {
        self.mutate(at, |table| {
            table.plan_change_parent(at, key, old_parent, new_parent)
        })?;
        debug!(strategy = Self::NAME, %key, %at, ?new_parent, "changed parent");
        Ok(())
    }

    fn ancestors(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        self.read()?.serving(at).table.ancestors(at, key)
    }

    fn descendants(&self, at: Timestamp, key: NodeKey) -> StoreResult<Vec<NodeKey>> {
        Ok(self.read()?.serving(at).table.descendants(at, key))
    }

    fn footprint(&self) -> StoreResult<StorageFootprint> {
        Ok(self.read()?.footprint())
    }

    fn parent(&self, at: Timestamp, key: NodeKey) -> StoreResult<Option<NodeKey>> {
        Ok(self
            .read()?
            .serving(at)
            .table
            .active_for_key(key, at)
            .and_then(|(_, row)| row.parent))
    }
}

impl std::fmt::Debug for SnapshottedParentPointerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let versions = self.version_count().unwrap_or_default();
        f.debug_struct("SnapshottedParentPointerStore")
            .field("threshold", &self.threshold)
            .field("version_count", &versions)
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

    /// A chain 1 -> 2 -> ... -> n, one node per tick.
    fn chain(store: &SnapshottedParentPointerStore, n: u64) {
        store.add_node(t(1), k(1), None).unwrap();
        for key in 2..=n {
            store.add_node(t(key), k(key), Some(k(key - 1))).unwrap();
        }
    }

    #[test]
    fn high_threshold_never_snapshots() {
        let store = SnapshottedParentPointerStore::new(1000);
        chain(&store, 20);
        assert_eq!(store.version_count().unwrap(), 1);
        assert_eq!(store.current_version().unwrap(), VersionId(0));
        assert_eq!(store.ancestors(t(21), k(3)).unwrap(), vec![k(2), k(1)]);
    }

    #[test]
    fn mutation_past_threshold_opens_shard() {
        let store = SnapshottedParentPointerStore::new(5);
        chain(&store, 6);
        // t=6 is 6 ticks after genesis, more than the threshold of 5.
        assert_eq!(store.version_count().unwrap(), 2);
        assert_eq!(store.current_version().unwrap(), VersionId(1));
        assert_eq!(store.version_at(t(6)).unwrap(), VersionId(0));
        assert_eq!(store.version_at(t(7)).unwrap(), VersionId(1));
    }

    #[test]
    fn every_shard_answers_for_its_own_window() {
        let store = SnapshottedParentPointerStore::new(3);
        chain(&store, 12);
        assert!(store.version_count().unwrap() > 2);

        for at in 2..=13u64 {
            let newest = (at - 1).min(12);
            let expected: Vec<_> = (1..newest).rev().map(k).collect();
            assert_eq!(
                store.ancestors(t(at), k(newest)).unwrap(),
                expected,
                "ancestors of {newest} at t={at}"
            );
            assert_eq!(
                sorted(store.descendants(t(at), k(1)).unwrap()),
                (2..=newest).map(k).collect::<Vec<_>>(),
                "descendants of 1 at t={at}"
            );
        }
    }

    #[test]
    fn new_shard_only_copies_visible_revisions() {
        let store = SnapshottedParentPointerStore::new(10);
        store.add_node(t(1), k(1), None).unwrap();
        store.add_node(t(2), k(2), Some(k(1))).unwrap();
        store.add_node(t(3), k(3), Some(k(2))).unwrap();
        store.implode_node(t(4), k(2)).unwrap();
        store.add_node(t(20), k(4), Some(k(3))).unwrap();

        let state = store.read().unwrap();
        assert_eq!(state.shards.len(), 2);
        let shard = &state.shards[1];
        assert_eq!(shard.created_at, t(20));
        // Keys 1 and 3 carried forward, then key 4 written.
        assert_eq!(shard.table.len(), 3);
        drop(state);

        assert_eq!(store.ancestors(t(21), k(4)).unwrap(), vec![k(3), k(1)]);
        assert_eq!(store.ancestors(t(4), k(3)).unwrap(), vec![k(2), k(1)]);
    }

    #[test]
    fn failed_mutation_does_not_open_shard() {
        let store = SnapshottedParentPointerStore::new(2);
        store.add_node(t(1), k(1), None).unwrap();
        store.add_node(t(2), k(2), Some(k(1))).unwrap();

        let err = store
            .change_parent(t(10), k(2), Some(k(99)), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentMismatch { .. }));
        assert_eq!(store.version_count().unwrap(), 1);
        assert_eq!(store.ancestors(t(11), k(2)).unwrap(), vec![k(1)]);
    }

    #[test]
    fn mutations_after_snapshot_land_in_new_shard() {
        let store = SnapshottedParentPointerStore::new(2);
        store.add_node(t(1), k(1), None).unwrap();
        store.add_node(t(2), k(2), Some(k(1))).unwrap();
        store.add_node(t(3), k(3), Some(k(1))).unwrap();
        store.change_parent(t(4), k(3), Some(k(1)), Some(k(2))).unwrap();

        assert_eq!(store.version_count().unwrap(), 2);
        assert_eq!(store.ancestors(t(5), k(3)).unwrap(), vec![k(2), k(1)]);
        assert_eq!(store.parent(t(4), k(3)).unwrap(), Some(k(1)));
    }

    #[test]
    fn independent_instances_keep_their_own_current_version() {
        let eager = SnapshottedParentPointerStore::new(1);
        let lazy = SnapshottedParentPointerStore::new(100);
        chain(&eager, 5);
        chain(&lazy, 5);
        assert!(eager.version_count().unwrap() > 1);
        assert_eq!(lazy.version_count().unwrap(), 1);
    }

    #[test]
    fn footprint_includes_every_shard_and_side_table() {
        let store = SnapshottedParentPointerStore::new(3);
        chain(&store, 8);
        let footprint = store.footprint().unwrap();
        let state = store.read().unwrap();
        let shard_rows: usize = state.shards.iter().map(|s| s.table.len()).sum();
        assert_eq!(footprint.rows, (shard_rows + state.shards.len()) as u64);
        assert!(shard_rows > 8);
    }

    #[test]
    fn debug_format() {
        let store = SnapshottedParentPointerStore::default();
        let debug = format!("{store:?}");
        assert!(debug.contains("threshold: 5000"));
        assert!(debug.contains("version_count: 1"));
    }
}
