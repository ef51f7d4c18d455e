//! Seeded workload generator.
//!
//! The generator drives a [`TreeModel`] through a pseudo-random mix of
//! mutations and records, after each update, a batch of point-in-time queries
//! answered from the model. The same config and seed always produce the same
//! workload.

use arbor_types::{NodeKey, Timestamp};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tree::TreeModel;
use crate::workload::{Check, Event, Mutation, Query, Workload};

/// Shape of a generated workload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Add-node events issued before the mixed phase.
    pub initial_inserts: usize,
    /// Mixed-phase mutations.
    pub updates: usize,
    /// Checks recorded after each mixed-phase mutation.
    pub reads_per_update: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            initial_inserts: 50,
            updates: 100,
            reads_per_update: 10,
        }
    }
}

/// Give up looking for a valid re-parent after this many samples.
const MOVE_ATTEMPTS: usize = 1000;

/// Produces a [`Workload`] from a [`GeneratorConfig`] and a seed.
pub struct Generator {
    config: GeneratorConfig,
    seed: u64,
    rng: StdRng,
    timestamp: Timestamp,
    next_key: u64,
    tree: TreeModel,
    workload: Workload,
}

impl Generator {
    pub fn new(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            timestamp: Timestamp::ZERO,
            next_key: 0,
            tree: TreeModel::new(),
            workload: Workload {
                seed,
                ..Workload::default()
            },
        }
    }

    /// Run the generator to completion.
    pub fn generate(mut self) -> Workload {
        for _ in 0..self.config.initial_inserts {
            self.tick();
            self.add_node();
        }

        for _ in 0..self.config.updates {
            self.tick();
            match self.rng.gen_range(0..100) {
                0..=85 => self.add_node(),
                86..=95 => self.change_parent(),
                _ => self.implode_node(),
            }

            for _ in 0..self.config.reads_per_update {
                self.tick();
                if self.rng.gen_range(0..100) <= 80 {
                    self.check(|key| Query::Ancestors { key });
                } else {
                    self.check(|key| Query::Descendants { key });
                }
            }
        }

        let stats = self.workload.stats();
        info!(
            seed = self.seed,
            events = self.workload.events.len(),
            checks = self.workload.checks.len(),
            live_nodes = self.tree.len(),
            add_node = stats.add_node,
            change_parent = stats.change_parent,
            implode_node = stats.implode_node,
            "generated workload"
        );
        self.workload
    }

    fn tick(&mut self) {
        self.timestamp = self.timestamp.next();
    }

    fn sample(&mut self) -> Option<NodeKey> {
        self.tree.live().choose(&mut self.rng).copied()
    }

    fn record(&mut self, mutation: Mutation) {
        self.workload.events.push(Event {
            timestamp: self.timestamp,
            mutation,
        });
    }

    fn add_node(&mut self) {
        self.next_key += 1;
        let key = NodeKey::new(self.next_key);
        let parent = self.sample();
        if self.tree.add(key, parent).is_ok() {
            self.record(Mutation::AddNode { key, parent });
        }
    }

    fn implode_node(&mut self) {
        let Some(key) = self.sample() else {
            return;
        };
        if self.tree.implode(key).is_ok() {
            self.record(Mutation::ImplodeNode { key });
        }
    }

    /// Move a sampled node under a sampled node outside its subtree. When no
    /// pair is found the timestamp is consumed without an event.
    fn change_parent(&mut self) {
        for _ in 0..MOVE_ATTEMPTS {
            let Some(key) = self.sample() else {
                return;
            };
            let targets = self.tree.move_targets(key);
            let Some(&new_parent) = targets.choose(&mut self.rng) else {
                continue;
            };

            let old_parent = self.tree.parent(key);
            if self.tree.change_parent(key, Some(new_parent)).is_ok() {
                self.record(Mutation::ChangeParent {
                    key,
                    old_parent,
                    new_parent: Some(new_parent),
                });
            }
            return;
        }
        debug!(timestamp = %self.timestamp, "no valid re-parent found");
    }

    /// Record a query against a sampled node, skipped while the tree is
    /// empty.
    fn check(&mut self, query_for: fn(NodeKey) -> Query) {
        let Some(key) = self.sample() else {
            return;
        };
        let query = query_for(key);
        let expected = self.tree.answer(&query);
        self.workload.checks.push(Check {
            timestamp: self.timestamp,
            query,
            expected,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(initial_inserts: usize, updates: usize, seed: u64) -> Workload {
        let config = GeneratorConfig {
            initial_inserts,
            updates,
            reads_per_update: 5,
        };
        Generator::new(config, seed).generate()
    }

    #[test]
    fn default_config_matches_reference_sizes() {
        let config = GeneratorConfig::default();
        assert_eq!(config.initial_inserts, 50);
        assert_eq!(config.updates, 100);
        assert_eq!(config.reads_per_update, 10);
    }

    #[test]
    fn same_seed_same_workload() {
        assert_eq!(generate(20, 50, 42), generate(20, 50, 42));
        assert_ne!(generate(20, 50, 42), generate(20, 50, 43));
    }

    #[test]
    fn initial_phase_only_adds() {
        let workload = generate(10, 0, 1);
        assert_eq!(workload.events.len(), 10);
        assert!(workload.checks.is_empty());
        assert_eq!(
            workload.events[0].mutation,
            Mutation::AddNode {
                key: NodeKey::new(1),
                parent: None,
            }
        );
        assert!(workload
            .events
            .iter()
            .all(|e| matches!(e.mutation, Mutation::AddNode { .. })));
    }

    #[test]
    fn timestamps_strictly_increase_and_never_collide() {
        let workload = generate(20, 80, 9);
        let mut stamps: Vec<u64> = workload
            .events
            .iter()
            .map(|e| e.timestamp.get())
            .chain(workload.checks.iter().map(|c| c.timestamp.get()))
            .collect();
        let total = stamps.len();
        stamps.sort_unstable();
        stamps.dedup();
        assert_eq!(stamps.len(), total);

        let events = &workload.events;
        assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn event_log_replays_into_the_model() {
        let workload = generate(30, 200, 5);
        let tree = workload.final_tree().unwrap();
        assert!(!tree.is_empty());
    }

    #[test]
    fn empty_config_yields_empty_workload() {
        let workload = generate(0, 0, 3);
        assert!(workload.events.is_empty());
        assert!(workload.checks.is_empty());
        assert_eq!(workload.seed, 3);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"updates": 5}"#).unwrap();
        assert_eq!(config.updates, 5);
        assert_eq!(config.initial_inserts, 50);
    }
}
