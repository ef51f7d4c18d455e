use std::collections::BTreeMap;
use std::time::Instant;

use arbor_store::{StorageFootprint, StoreError, TreeStore};
use arbor_types::{NodeKey, Timestamp};
use arbor_workload::{Check, Event, Mutation, Query, Workload};
use chrono::Utc;
use tracing::{debug, info};

use crate::error::HarnessError;
use crate::instrument::{Instrumentation, Metric};
use crate::results::RunSummary;

pub const SETUP_TOTAL: &str = "setup_total";
pub const TESTS_TOTAL: &str = "tests_total";

/// Outcome of replaying one workload against one store.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub strategy: String,
    pub events: usize,
    pub checks: usize,
    /// Per-operation timings keyed by `add_node`, `implode_node`,
    /// `change_parent`, `ancestors` and `descendants`.
    pub metrics: BTreeMap<String, Metric>,
    /// The whole mutation phase.
    pub setup_total: Metric,
    /// The whole query phase.
    pub tests_total: Metric,
    pub footprint: StorageFootprint,
}

impl RunReport {
    /// Freeze this report into a results-book entry stamped with the
    /// current time.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            metrics: self.metrics.clone(),
            setup_total: self.setup_total.total_time,
            tests_total: self.tests_total.total_time,
            db_size: self.footprint.megabytes(),
            footprint: self.footprint,
            recorded_at: Utc::now(),
        }
    }
}

/// Applies a [`Workload`] to a store: the whole event log first, then every
/// check. Checks land at past timestamps, so the query phase exercises
/// historical reads.
pub struct ReplayHarness<'a> {
    store: &'a dyn TreeStore,
}

impl<'a> ReplayHarness<'a> {
    pub fn new(store: &'a dyn TreeStore) -> Self {
        Self { store }
    }

    pub fn run(&self, workload: &Workload) -> Result<RunReport, HarnessError> {
        let mut instrumentation = Instrumentation::new();
        let strategy = self.store.name();

        info!(strategy, events = workload.events.len(), "replaying events");
        let start = Instant::now();
        for event in &workload.events {
            self.apply(&mut instrumentation, event)?;
        }
        instrumentation.record(SETUP_TOTAL, start.elapsed());

        info!(strategy, checks = workload.checks.len(), "running checks");
        let start = Instant::now();
        for check in &workload.checks {
            self.verify(&mut instrumentation, check)?;
        }
        instrumentation.record(TESTS_TOTAL, start.elapsed());

        let footprint = self
            .store
            .footprint()
            .map_err(|source| HarnessError::Store {
                operation: "footprint",
                timestamp: workload
                    .events
                    .last()
                    .map_or(Timestamp::ZERO, |e| e.timestamp),
                source,
            })?;

        let setup_total = instrumentation.take(SETUP_TOTAL);
        let tests_total = instrumentation.take(TESTS_TOTAL);
        info!(
            strategy,
            setup_secs = setup_total.total_time,
            tests_secs = tests_total.total_time,
            rows = footprint.rows,
            "replay finished"
        );

        Ok(RunReport {
            strategy: strategy.to_string(),
            events: workload.events.len(),
            checks: workload.checks.len(),
            metrics: instrumentation.into_metrics(),
            setup_total,
            tests_total,
            footprint,
        })
    }

    fn apply(
        &self,
        instrumentation: &mut Instrumentation,
        event: &Event,
    ) -> Result<(), HarnessError> {
        let at = event.timestamp;
        let label = event.mutation.label();
        let result = instrumentation.measure(label, || match event.mutation {
            Mutation::AddNode { key, parent } => self.store.add_node(at, key, parent),
            Mutation::ImplodeNode { key } => self.store.implode_node(at, key),
            Mutation::ChangeParent {
                key,
                old_parent,
                new_parent,
            } => self.store.change_parent(at, key, old_parent, new_parent),
        });
        result.map_err(|source| store_error(label, at, source))
    }

    fn verify(
        &self,
        instrumentation: &mut Instrumentation,
        check: &Check,
    ) -> Result<(), HarnessError> {
        let at = check.timestamp;
        let label = check.query.label();
        let actual: Vec<NodeKey> = instrumentation
            .measure(label, || match check.query {
                Query::Ancestors { key } => self.store.ancestors(at, key),
                Query::Descendants { key } => self.store.descendants(at, key),
            })
            .map_err(|source| store_error(label, at, source))?;

        if !check.query.accepts(&check.expected, &actual) {
            debug!(%at, ?check.query, "check failed");
            return Err(HarnessError::CheckFailed {
                timestamp: at,
                query: check.query,
                expected: check.expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

fn store_error(operation: &'static str, timestamp: Timestamp, source: StoreError) -> HarnessError {
    HarnessError::Store {
        operation,
        timestamp,
        source,
    }
}
