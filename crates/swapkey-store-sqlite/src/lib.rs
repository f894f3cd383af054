//! SQLite key-value engine for the host application's state database.
//!
//! The host keeps a single `ItemTable` of string keys and textual values.
//! [`KvStore`] never holds the file open: every operation loads the whole
//! image into an in-memory connection on a [`tokio_rusqlite`] thread, works
//! on it there, and (for mutations) exports the full image back over the
//! file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use encode::StoreValue;
pub use error::{Error, Result};
pub use store::KvStore;
