//! Bitemporal tree storage for Arbor.
//!
//! This crate holds four competing representations of a mutable, versioned
//! tree in which every mutation stays queryable at any past logical instant.
//! Nothing is ever physically deleted: mutations close the validity window of
//! existing rows and append replacements.
//!
//! # Strategies
//!
//! All strategies implement the [`TreeStore`] trait:
//!
//! - [`ParentPointerStore`] -- one `(key, parent, validity)` row per revision
//! - [`SnapshottedParentPointerStore`] -- the same rows, partitioned into
//!   periodically copied version shards to bound scan depth
//! - [`MaterializedPathStore`] -- one `(key, path, validity)` row per revision,
//!   descendants found with a component-aware prefix index
//! - [`ClosureTableStore`] -- one `(ancestor, descendant, level, validity)`
//!   row per reachable pair
//!
//! # Design Rules
//!
//! 1. History is append-only. Rows are closed, never removed.
//! 2. A row written at `t` is visible from `t + 1`; see [`Validity`].
//! 3. Every mutation is planned against a consistent read and then applied
//!    under the same write lock, so it commits fully or not at all.
//! 4. Reads never mutate and return empty results for unknown keys.
//! 5. Cycle-freedom is the caller's obligation; `change_parent` does not
//!    check that the new parent lies outside the moving subtree.
//!
//! [`Validity`]: arbor_types::Validity

pub mod closure;
pub mod config;
pub mod error;
pub mod materialized_path;
pub mod parent_pointer;
pub mod path;
mod plan;
pub mod snapshot;
pub mod strategy;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use closure::{ClosureEdge, ClosureTableStore};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use materialized_path::{MaterializedPathStore, PathRevision};
pub use parent_pointer::{ParentPointerStore, ParentRevision};
pub use path::MaterializedPath;
pub use snapshot::{SnapshottedParentPointerStore, VersionId};
pub use strategy::{StrategyKind, UnknownStrategy};
pub use traits::{StorageFootprint, TreeStore};
