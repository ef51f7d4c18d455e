use serde::{Deserialize, Serialize};

/// Tunables shared by the store factory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Ticks that must elapse since the last version shard before a mutation
    /// opens a new one. Only the snapshotted parent-pointer strategy reads
    /// this. Lower values copy more often and scan less per read.
    pub snapshot_threshold: u64,
}

impl StoreConfig {
    pub const DEFAULT_SNAPSHOT_THRESHOLD: u64 = 5000;

    pub fn with_snapshot_threshold(snapshot_threshold: u64) -> Self {
        Self { snapshot_threshold }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: Self::DEFAULT_SNAPSHOT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(StoreConfig::default().snapshot_threshold, 5000);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(parsed, StoreConfig::default());

        let parsed: StoreConfig = toml::from_str("snapshot_threshold = 25").unwrap();
        assert_eq!(parsed.snapshot_threshold, 25);
    }
}
