use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use arbor_store::StorageFootprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ResultsError;
use crate::instrument::Metric;

/// Per-operation metrics, in table order.
pub const METRICS: [&str; 5] = [
    "add_node",
    "change_parent",
    "implode_node",
    "ancestors",
    "descendants",
];

/// Whole-run figures, in table order.
pub const TOTALS: [&str; 3] = ["setup_total", "tests_total", "db_size"];

/// Results of one strategy on one dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub metrics: BTreeMap<String, Metric>,
    /// Seconds spent replaying the event log.
    pub setup_total: f64,
    /// Seconds spent running the checks.
    pub tests_total: f64,
    /// Storage footprint in mebibytes.
    pub db_size: f64,
    pub footprint: StorageFootprint,
    pub recorded_at: DateTime<Utc>,
}

impl RunSummary {
    /// The table cell for `column`, one of [`METRICS`] or [`TOTALS`].
    fn cell(&self, column: &str) -> Option<f64> {
        match column {
            "setup_total" => Some(self.setup_total),
            "tests_total" => Some(self.tests_total),
            "db_size" => Some(self.db_size),
            metric => self.metrics.get(metric).map(|m| m.time_per_call),
        }
    }
}

/// Run summaries keyed by strategy, then dataset.
///
/// Persisted as JSON and merged on every run: recording a strategy/dataset
/// pair replaces only that entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsBook {
    runs: BTreeMap<String, BTreeMap<String, RunSummary>>,
}

impl ResultsBook {
    /// Load the book at `path`, or an empty one if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ResultsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ResultsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ResultsError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw).map_err(|source| ResultsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), strategies = self.runs.len(), "saved results");
        Ok(())
    }

    pub fn record(&mut self, strategy: &str, dataset: &str, summary: RunSummary) {
        self.runs
            .entry(strategy.to_string())
            .or_default()
            .insert(dataset.to_string(), summary);
    }

    pub fn get(&self, strategy: &str, dataset: &str) -> Option<&RunSummary> {
        self.runs.get(strategy)?.get(dataset)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn strategies(&self) -> Vec<&str> {
        self.runs.keys().map(String::as_str).collect()
    }

    /// Every dataset any strategy has a result for, sorted.
    pub fn datasets(&self) -> Vec<&str> {
        let datasets: BTreeSet<&str> = self
            .runs
            .values()
            .flat_map(|by_dataset| by_dataset.keys().map(String::as_str))
            .collect();
        datasets.into_iter().collect()
    }

    /// Render the comparison table as tab-separated rows.
    ///
    /// One block per metric and total: a header row naming the strategies,
    /// then one row per dataset. Per-operation blocks show time per call.
    /// Missing results are empty cells.
    pub fn render_tsv(&self) -> String {
        let strategies = self.strategies();
        let datasets = self.datasets();
        let mut rows: Vec<String> = Vec::new();

        for column in METRICS.iter().chain(TOTALS.iter()) {
            let mut header = vec![*column];
            header.extend(&strategies);
            rows.push(header.join("\t"));

            for dataset in &datasets {
                let mut row = vec![dataset.to_string()];
                row.extend(strategies.iter().map(|strategy| {
                    self.get(strategy, dataset)
                        .and_then(|summary| summary.cell(column))
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                }));
                rows.push(row.join("\t"));
            }
        }
        rows.join("\n")
    }
}
