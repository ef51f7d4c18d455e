//! Foundation types for Arbor, a workbench for bitemporal tree storage.
//!
//! Every other Arbor crate depends on `arbor-types`.
//!
//! # Key Types
//!
//! - [`NodeKey`] — Stable integer identity of a tree node, never reused
//! - [`Timestamp`] — Logical clock ordering every event and query
//! - [`Validity`] — Append-only validity window of a stored revision

pub mod error;
pub mod key;
pub mod temporal;

pub use error::TypeError;
pub use key::NodeKey;
pub use temporal::{Timestamp, Validity};
