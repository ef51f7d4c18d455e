//! Synthetic workloads for the Arbor tree stores.
//!
//! A [`Workload`] is an event log of tree mutations plus a test log of
//! point-in-time queries with their expected answers. The [`Generator`]
//! produces one from a seed by driving an in-memory [`TreeModel`], so every
//! expected answer is what a correct store must return.

pub mod error;
pub mod generator;
pub mod tree;
pub mod workload;

pub use error::{WorkloadError, WorkloadResult};
pub use generator::{Generator, GeneratorConfig};
pub use tree::TreeModel;
pub use workload::{Check, Event, Mutation, Query, Workload, WorkloadStats};
