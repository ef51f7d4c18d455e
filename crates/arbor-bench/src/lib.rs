//! Replay harness for the Arbor tree stores.
//!
//! This crate provides:
//! - `ReplayHarness`: applies a workload to one store, timing every call and
//!   checking every query against its recorded answer
//! - `Instrumentation`: per-label call counts and timings
//! - `ResultsBook`: run summaries merged per strategy and dataset, rendered
//!   as a tab-separated comparison table
//! - `BenchConfig`: TOML configuration for benchmark sweeps

pub mod config;
pub mod error;
pub mod instrument;
pub mod replay;
pub mod results;

pub use config::BenchConfig;
pub use error::{ConfigError, HarnessError, ResultsError};
pub use instrument::{Instrumentation, Metric};
pub use replay::{ReplayHarness, RunReport};
pub use results::{ResultsBook, RunSummary};
