//! SQLite backend for the Covenant contract store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Multi-row writes (a contract with its
//! first version, a recipient replacement, a version append) each run inside
//! a single SQLite transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
