//! SQLite backend for the Quill maintenance pipeline.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Besides the [`SqliteStore`] itself this
//! crate owns the file-level operations on the live database (checkpoint,
//! snapshot, restore) and the migration-directory runner.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod file_ops;
pub mod migrations;

pub use error::{Error, Result};
pub use store::SqliteStore;
