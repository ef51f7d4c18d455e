use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::closure::ClosureTableStore;
use crate::config::StoreConfig;
use crate::materialized_path::MaterializedPathStore;
use crate::parent_pointer::ParentPointerStore;
use crate::snapshot::SnapshottedParentPointerStore;
use crate::traits::TreeStore;

/// The storage strategies a store can be built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ParentPointer,
    #[serde(rename = "parent_pointer_snapshots")]
    SnapshottedParentPointer,
    MaterializedPath,
    ClosureTable,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::ParentPointer,
        StrategyKind::SnapshottedParentPointer,
        StrategyKind::MaterializedPath,
        StrategyKind::ClosureTable,
    ];

    /// The label the built store reports from [`TreeStore::name`].
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::ParentPointer => ParentPointerStore::NAME,
            StrategyKind::SnapshottedParentPointer => SnapshottedParentPointerStore::NAME,
            StrategyKind::MaterializedPath => MaterializedPathStore::NAME,
            StrategyKind::ClosureTable => ClosureTableStore::NAME,
        }
    }

    /// Build an empty store of this kind.
    pub fn build(self, config: &StoreConfig) -> Box<dyn TreeStore> {
        match self {
            StrategyKind::ParentPointer => Box::new(ParentPointerStore::new()),
            StrategyKind::SnapshottedParentPointer => {
                Box::new(SnapshottedParentPointerStore::from_config(config))
            }
            StrategyKind::MaterializedPath => Box::new(MaterializedPathStore::new()),
            StrategyKind::ClosureTable => Box::new(ClosureTableStore::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A strategy label that names no known strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.label() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}
