//! SQLite backend for the rejstrik graph store.
//!
//! Nodes and relationships are rows keyed by their graph identity; property
//! maps are JSON documents merged in place with `json_patch`. All database
//! access runs on [`tokio_rusqlite`]'s dedicated thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreStats};
