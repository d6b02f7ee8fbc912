//! SQLite backend for the Batchline document repository.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Hosts the integration suite
//! that drives the version state machine against an in-memory store.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteRepository;
