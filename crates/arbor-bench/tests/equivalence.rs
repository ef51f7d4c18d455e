//! Cross-strategy equivalence on generated workloads.
//!
//! Every strategy must pass every recorded check, and must agree with the
//! plain parent-pointer store on arbitrary historical reads, including reads
//! of nodes that were imploded or moved later on.

use arbor_bench::ReplayHarness;
use arbor_store::{StoreConfig, StrategyKind, TreeStore};
use arbor_types::{NodeKey, Timestamp};
use arbor_workload::{Generator, GeneratorConfig, Mutation, Workload};
use proptest::prelude::*;

fn generate(seed: u64, updates: usize) -> Workload {
    let config = GeneratorConfig {
        initial_inserts: 20,
        updates,
        reads_per_update: 3,
    };
    Generator::new(config, seed).generate()
}

fn replayed(kind: StrategyKind, workload: &Workload, threshold: u64) -> Box<dyn TreeStore> {
    let store = kind.build(&StoreConfig::with_snapshot_threshold(threshold));
    for event in &workload.events {
        let at = event.timestamp;
        let result = match event.mutation {
            Mutation::AddNode { key, parent } => store.add_node(at, key, parent),
            Mutation::ImplodeNode { key } => store.implode_node(at, key),
            Mutation::ChangeParent {
                key,
                old_parent,
                new_parent,
            } => store.change_parent(at, key, old_parent, new_parent),
        };
        result.unwrap();
    }
    store
}

fn sorted(mut keys: Vec<NodeKey>) -> Vec<NodeKey> {
    keys.sort();
    keys
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_strategy_passes_recorded_checks(
        seed in any::<u64>(),
        updates in 0usize..150,
        threshold in 1u64..200,
    ) {
        let workload = generate(seed, updates);
        for kind in StrategyKind::ALL {
            let store = kind.build(&StoreConfig::with_snapshot_threshold(threshold));
            let outcome = ReplayHarness::new(store.as_ref()).run(&workload);
            prop_assert!(outcome.is_ok(), "{}: {:?}", kind, outcome.err());
        }
    }

    #[test]
    fn strategies_agree_on_historical_reads(
        seed in any::<u64>(),
        updates in 1usize..120,
        threshold in 1u64..100,
        probes in prop::collection::vec((any::<prop::sample::Index>(), 0u64..4), 1..40),
    ) {
        let workload = generate(seed, updates);
        let reference = replayed(StrategyKind::ParentPointer, &workload, threshold);
        let others: Vec<_> = StrategyKind::ALL[1..]
            .iter()
            .map(|&kind| replayed(kind, &workload, threshold))
            .collect();

        for (index, offset) in probes {
            let event = index.get(&workload.events);
            let at = Timestamp::new(event.timestamp.get() + offset);
            let key = event.mutation.key();

            let ancestors = reference.ancestors(at, key).unwrap();
            let descendants = sorted(reference.descendants(at, key).unwrap());
            for store in &others {
                prop_assert_eq!(&store.ancestors(at, key).unwrap(), &ancestors, "{}", store.name());
                prop_assert_eq!(
                    &sorted(store.descendants(at, key).unwrap()),
                    &descendants,
                    "{}",
                    store.name()
                );
            }
        }
    }
}

#[test]
fn dense_snapshots_match_sparse_snapshots() {
    let workload = generate(2024, 300);
    let dense = replayed(StrategyKind::SnapshottedParentPointer, &workload, 1);
    let sparse = replayed(StrategyKind::SnapshottedParentPointer, &workload, 10_000);

    let last = workload.events.last().map_or(0, |e| e.timestamp.get());
    for raw in (1..=last + 1).step_by(7) {
        let at = Timestamp::new(raw);
        for event in workload.events.iter().step_by(5) {
            let key = event.mutation.key();
            assert_eq!(
                dense.ancestors(at, key).unwrap(),
                sparse.ancestors(at, key).unwrap()
            );
        }
    }
}
