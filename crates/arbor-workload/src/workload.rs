//! Workload exchange types and the workload file codec.
//!
//! Files ending in `.json` are written with `serde_json`; any other
//! extension gets the compact `bincode` encoding.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use arbor_types::{NodeKey, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{WorkloadError, WorkloadResult};
use crate::tree::TreeModel;

/// A tree mutation, applied to a store at the owning event's timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    AddNode {
        key: NodeKey,
        parent: Option<NodeKey>,
    },
    ImplodeNode {
        key: NodeKey,
    },
    ChangeParent {
        key: NodeKey,
        old_parent: Option<NodeKey>,
        new_parent: Option<NodeKey>,
    },
}

impl Mutation {
    /// The node the mutation acts on.
    pub fn key(&self) -> NodeKey {
        match *self {
            Mutation::AddNode { key, .. }
            | Mutation::ImplodeNode { key }
            | Mutation::ChangeParent { key, .. } => key,
        }
    }

    /// Metric label of the store call this mutation becomes.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::AddNode { .. } => "add_node",
            Mutation::ImplodeNode { .. } => "implode_node",
            Mutation::ChangeParent { .. } => "change_parent",
        }
    }
}

/// One entry of the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub mutation: Mutation,
}

/// A read-only tree query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    Ancestors { key: NodeKey },
    Descendants { key: NodeKey },
}

impl Query {
    pub fn key(&self) -> NodeKey {
        match *self {
            Query::Ancestors { key } | Query::Descendants { key } => key,
        }
    }

    /// Metric label of the store call this query becomes.
    pub fn label(&self) -> &'static str {
        match self {
            Query::Ancestors { .. } => "ancestors",
            Query::Descendants { .. } => "descendants",
        }
    }

    /// Whether `actual` answers this query as `expected` does. Ancestors
    /// must match in order; descendants are compared as sets.
    pub fn accepts(&self, expected: &[NodeKey], actual: &[NodeKey]) -> bool {
        match self {
            Query::Ancestors { .. } => expected == actual,
            Query::Descendants { .. } => {
                let mut expected = expected.to_vec();
                let mut actual = actual.to_vec();
                expected.sort_unstable();
                actual.sort_unstable();
                expected == actual
            }
        }
    }
}

/// One entry of the test log: a query and the answer a correct store gives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub timestamp: Timestamp,
    pub query: Query,
    pub expected: Vec<NodeKey>,
}

/// A complete generated dataset.
///
/// Event and check timestamps are strictly increasing and never shared, and
/// each check is placed after every event it depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub seed: u64,
    pub events: Vec<Event>,
    pub checks: Vec<Check>,
}

/// Per-kind operation counts of a workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadStats {
    pub add_node: usize,
    pub implode_node: usize,
    pub change_parent: usize,
    pub ancestors: usize,
    pub descendants: usize,
}

impl Workload {
    pub fn stats(&self) -> WorkloadStats {
        let mut stats = WorkloadStats::default();
        for event in &self.events {
            match event.mutation {
                Mutation::AddNode { .. } => stats.add_node += 1,
                Mutation::ImplodeNode { .. } => stats.implode_node += 1,
                Mutation::ChangeParent { .. } => stats.change_parent += 1,
            }
        }
        for check in &self.checks {
            match check.query {
                Query::Ancestors { .. } => stats.ancestors += 1,
                Query::Descendants { .. } => stats.descendants += 1,
            }
        }
        stats
    }

    /// Replay the event log into a fresh model, the tree as of the last
    /// event. Fails on the first event the model rejects.
    pub fn final_tree(&self) -> WorkloadResult<TreeModel> {
        let mut tree = TreeModel::new();
        for event in &self.events {
            tree.apply(&event.mutation)?;
        }
        Ok(tree)
    }

    /// Write the workload to `path`, choosing the codec by extension.
    pub fn save(&self, path: &Path) -> WorkloadResult<()> {
        let file = File::create(path).map_err(|source| WorkloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        if is_json(path) {
            serde_json::to_writer(&mut writer, self)?;
        } else {
            bincode::serialize_into(&mut writer, self)?;
        }
        writer.flush().map_err(|source| WorkloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            events = self.events.len(),
            checks = self.checks.len(),
            "saved workload"
        );
        Ok(())
    }

    /// Read a workload written by [`Workload::save`].
    pub fn load(path: &Path) -> WorkloadResult<Self> {
        let file = File::open(path).map_err(|source| WorkloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let workload = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            bincode::deserialize_from(reader)?
        };
        Ok(workload)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(raw: u64) -> NodeKey {
        NodeKey::new(raw)
    }

    fn t(raw: u64) -> Timestamp {
        Timestamp::new(raw)
    }

    fn small_workload() -> Workload {
        Workload {
            seed: 7,
            events: vec![
                Event {
                    timestamp: t(1),
                    mutation: Mutation::AddNode {
                        key: k(1),
                        parent: None,
                    },
                },
                Event {
                    timestamp: t(2),
                    mutation: Mutation::AddNode {
                        key: k(2),
                        parent: Some(k(1)),
                    },
                },
                Event {
                    timestamp: t(3),
                    mutation: Mutation::ChangeParent {
                        key: k(2),
                        old_parent: Some(k(1)),
                        new_parent: None,
                    },
                },
            ],
            checks: vec![Check {
                timestamp: t(4),
                query: Query::Ancestors { key: k(2) },
                expected: vec![],
            }],
        }
    }

    #[test]
    fn stats_count_each_kind() {
        let stats = small_workload().stats();
        assert_eq!(stats.add_node, 2);
        assert_eq!(stats.change_parent, 1);
        assert_eq!(stats.implode_node, 0);
        assert_eq!(stats.ancestors, 1);
        assert_eq!(stats.descendants, 0);
    }

    #[test]
    fn final_tree_replays_events() {
        let tree = small_workload().final_tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.parent(k(2)), None);
    }

    #[test]
    fn descendants_compare_as_sets() {
        let query = Query::Descendants { key: k(1) };
        assert!(query.accepts(&[k(2), k(3)], &[k(3), k(2)]));
        assert!(!query.accepts(&[k(2), k(3)], &[k(2)]));

        let query = Query::Ancestors { key: k(3) };
        assert!(query.accepts(&[k(2), k(1)], &[k(2), k(1)]));
        assert!(!query.accepts(&[k(2), k(1)], &[k(1), k(2)]));
    }

    #[test]
    fn json_is_human_readable() {
        let json = serde_json::to_string(&small_workload().events[1]).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":2,"mutation":{"add_node":{"key":2,"parent":1}}}"#
        );
    }

    #[test]
    fn file_round_trip_for_both_codecs() {
        let dir = tempfile::tempdir().unwrap();
        let workload = small_workload();
        for name in ["data.json", "data.bin"] {
            let path = dir.path().join(name);
            workload.save(&path).unwrap();
            assert_eq!(Workload::load(&path).unwrap(), workload);
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let err = Workload::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.bin"));
    }
}
