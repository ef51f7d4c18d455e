//! Reference tree that workloads are generated against.
//!
//! [`TreeModel`] is an arena keyed by [`NodeKey`] holding only each node's
//! parent. The parent -> children index is derived from it and kept in sync
//! by every mutation, so ancestor and descendant queries never need owning
//! links between nodes.
//!
//! # Invariants
//!
//! - Every parent reference resolves to a live node.
//! - The parent relation is acyclic.
//! - `live` lists exactly the keys of `parents`, in insertion order, so
//!   sampling from it is reproducible for a given RNG.

use std::collections::{HashMap, HashSet};

use arbor_types::NodeKey;
use tracing::debug;

use crate::error::{WorkloadError, WorkloadResult};
use crate::workload::{Mutation, Query};

/// The current shape of a tree without any history.
#[derive(Clone, Debug, Default)]
pub struct TreeModel {
    parents: HashMap<NodeKey, Option<NodeKey>>,
    /// Forward-edge index: parent -> children in attachment order.
    children: HashMap<NodeKey, Vec<NodeKey>>,
    live: Vec<NodeKey>,
}

impl TreeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.parents.contains_key(&key)
    }

    /// Live keys in insertion order.
    pub fn live(&self) -> &[NodeKey] {
        &self.live
    }

    /// Parent of `key`; `None` for roots and unknown keys.
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.parents.get(&key).copied().flatten()
    }

    /// Direct children of `key` in attachment order.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.children.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add `key` under `parent`, or as a root.
    pub fn add(&mut self, key: NodeKey, parent: Option<NodeKey>) -> WorkloadResult<()> {
        if self.contains(key) {
            return Err(WorkloadError::DuplicateNode(key));
        }
        if let Some(parent) = parent {
            self.require(parent)?;
            self.children.entry(parent).or_default().push(key);
        }
        self.parents.insert(key, parent);
        self.live.push(key);
        Ok(())
    }

    /// Remove `key`, handing its children to its parent.
    pub fn implode(&mut self, key: NodeKey) -> WorkloadResult<()> {
        let parent = self.require(key)?;
        self.detach(key, parent);

        let orphans = self.children.remove(&key).unwrap_or_default();
        for child in &orphans {
            self.parents.insert(*child, parent);
        }
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().extend(&orphans);
        }

        self.parents.remove(&key);
        self.live.retain(|live| *live != key);
        debug!(%key, children = orphans.len(), "imploded model node");
        Ok(())
    }

    /// Move `key` and its subtree under `new_parent`.
    ///
    /// Rejects a new parent inside the moving subtree.
    pub fn change_parent(
        &mut self,
        key: NodeKey,
        new_parent: Option<NodeKey>,
    ) -> WorkloadResult<()> {
        let old_parent = self.require(key)?;
        if let Some(new_parent) = new_parent {
            self.require(new_parent)?;
            if new_parent == key || self.descendants(key).contains(&new_parent) {
                return Err(WorkloadError::CycleDetected { key, new_parent });
            }
        }

        self.detach(key, old_parent);
        if let Some(new_parent) = new_parent {
            self.children.entry(new_parent).or_default().push(key);
        }
        self.parents.insert(key, new_parent);
        Ok(())
    }

    /// Apply a recorded mutation.
    ///
    /// `ChangeParent` is checked against the recorded old parent the same way
    /// a store checks it.
    pub fn apply(&mut self, mutation: &Mutation) -> WorkloadResult<()> {
        match *mutation {
            Mutation::AddNode { key, parent } => self.add(key, parent),
            Mutation::ImplodeNode { key } => self.implode(key),
            Mutation::ChangeParent {
                key,
                old_parent,
                new_parent,
            } => {
                let actual = self.require(key)?;
                if actual != old_parent {
                    return Err(WorkloadError::ParentMismatch {
                        key,
                        recorded: old_parent,
                        actual,
                    });
                }
                self.change_parent(key, new_parent)
            }
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Ancestors nearest first, ending at the root.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            result.push(parent);
            current = self.parent(parent);
        }
        result
    }

    /// All descendants: direct children first, then each child's subtree.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let children = self.children(key);
        let mut result = children.to_vec();
        for child in children {
            result.extend(self.descendants(*child));
        }
        result
    }

    /// The answer a correct store gives to `query` now.
    pub fn answer(&self, query: &Query) -> Vec<NodeKey> {
        match *query {
            Query::Ancestors { key } => self.ancestors(key),
            Query::Descendants { key } => self.descendants(key),
        }
    }

    /// Live nodes that `key` may be moved under: everything except `key`
    /// and its subtree, in insertion order.
    pub fn move_targets(&self, key: NodeKey) -> Vec<NodeKey> {
        let excluded: HashSet<NodeKey> = self.descendants(key).into_iter().collect();
        self.live
            .iter()
            .copied()
            .filter(|candidate| *candidate != key && !excluded.contains(candidate))
            .collect()
    }

    fn require(&self, key: NodeKey) -> WorkloadResult<Option<NodeKey>> {
        self.parents
            .get(&key)
            .copied()
            .ok_or(WorkloadError::NodeNotFound(key))
    }

    fn detach(&mut self, key: NodeKey, parent: Option<NodeKey>) {
        if let Some(siblings) = parent.and_then(|parent| self.children.get_mut(&parent)) {
            siblings.retain(|sibling| *sibling != key);
        }
    }
}
