//! The recipe version lineage and rebase engine.
//!
//! Four components, leaves first:
//!
//! - [`bucket`] — version-bucket resolution: the partition key for a branch
//!   and the next published version number within it.
//! - [`delta`] — pure quantity-line delta computation and replay, the
//!   rebase core.
//! - [`graph`] — the lineage display tree and cycle-safe root-to-node path
//!   reconstruction.
//! - [`machine`] — the version state machine orchestrating
//!   create-variation, publish-test, promote-to-master, and
//!   detach-to-root against a [`batchline_core::repo::Repository`].
//!
//! The engine owns no transactions and performs no retries: every
//! operation runs inside whatever atomicity the repository provides, and a
//! version-bucket race surfaces as the backend's version-conflict error
//! for the caller to retry.

pub mod bucket;
pub mod delta;
pub mod error;
pub mod graph;
pub mod machine;

pub use error::EngineError;
