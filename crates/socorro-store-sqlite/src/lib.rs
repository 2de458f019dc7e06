//! SQLite backend for the Socorro case store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every mutation is one SQLite
//! transaction executed on that thread, so writes are serialised and a
//! failed operation leaves nothing behind.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
