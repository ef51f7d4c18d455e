use std::fs;
use std::path::{Path, PathBuf};

use arbor_store::{StoreConfig, StrategyKind};
use arbor_workload::GeneratorConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for benchmark sweeps, usually read from `arbor.toml`.
///
/// Every section is optional; a missing file behaves like an empty one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Shape of workloads produced by `generate`.
    pub generator: GeneratorConfig,
    /// Store tunables applied to every strategy built.
    pub store: StoreConfig,
    /// Strategies a sweep runs, in order.
    pub strategies: Vec<StrategyKind>,
    /// Workload files a sweep replays.
    pub datasets: Vec<PathBuf>,
    /// JSON results book that every run is merged into.
    pub results_path: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            store: StoreConfig::default(),
            strategies: StrategyKind::ALL.to_vec(),
            datasets: Vec::new(),
            results_path: PathBuf::from("results.json"),
        }
    }
}

impl BenchConfig {
    pub const DEFAULT_PATH: &'static str = "arbor.toml";

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.strategies.len(), 4);
        assert_eq!(config.store.snapshot_threshold, 5000);
        assert_eq!(config.generator.updates, 100);
        assert_eq!(config.results_path, PathBuf::from("results.json"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BenchConfig::from_toml(
            r#"
            strategies = ["closure_table", "materialized_path"]
            datasets = ["data/small.bin"]

            [store]
            snapshot_threshold = 200

            [generator]
            updates = 1000
            "#,
        )
        .unwrap();
        assert_eq!(
            config.strategies,
            vec![StrategyKind::ClosureTable, StrategyKind::MaterializedPath]
        );
        assert_eq!(config.datasets, vec![PathBuf::from("data/small.bin")]);
        assert_eq!(config.store.snapshot_threshold, 200);
        assert_eq!(config.generator.updates, 1000);
        assert_eq!(config.generator.initial_inserts, 50);
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = BenchConfig::from_toml(r#"strategies = ["b_tree"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::load(&dir.path().join("arbor.toml")).unwrap();
        assert_eq!(config, BenchConfig::default());
    }
}
