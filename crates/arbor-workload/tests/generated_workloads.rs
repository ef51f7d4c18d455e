//! Property tests over generated workloads.

use arbor_workload::{Generator, GeneratorConfig, Query, TreeModel, Workload};
use proptest::prelude::*;

fn generate(seed: u64, initial_inserts: usize, updates: usize) -> Workload {
    let config = GeneratorConfig {
        initial_inserts,
        updates,
        reads_per_update: 3,
    };
    Generator::new(config, seed).generate()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Replaying events and checks in timestamp order through a fresh model
    /// reproduces every recorded answer.
    #[test]
    fn recorded_answers_match_replay(
        seed in any::<u64>(),
        initial_inserts in 0usize..30,
        updates in 0usize..120,
    ) {
        let workload = generate(seed, initial_inserts, updates);
        let mut tree = TreeModel::new();
        let mut events = workload.events.iter().peekable();

        for check in &workload.checks {
            while let Some(event) = events.next_if(|e| e.timestamp < check.timestamp) {
                tree.apply(&event.mutation).unwrap();
            }
            let actual = tree.answer(&check.query);
            prop_assert!(check.query.accepts(&check.expected, &actual));
        }
    }

    /// The parent relation stays acyclic: every ancestor chain is shorter
    /// than the number of live nodes.
    #[test]
    fn generated_trees_stay_acyclic(seed in any::<u64>(), updates in 0usize..200) {
        let workload = generate(seed, 10, updates);
        let tree = workload.final_tree().unwrap();
        for &key in tree.live() {
            let ancestors = tree.ancestors(key);
            prop_assert!(ancestors.len() < tree.len());
            prop_assert!(!ancestors.contains(&key));
        }
    }

    #[test]
    fn ancestors_checks_end_at_a_root(seed in any::<u64>()) {
        let workload = generate(seed, 20, 60);
        for check in &workload.checks {
            if let Query::Ancestors { key } = check.query {
                prop_assert!(!check.expected.contains(&key));
            }
        }
    }
}
