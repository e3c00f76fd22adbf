//! Error type for `quill-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quill_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("value out of range for column {column}: {value}")]
  OutOfRange { column: &'static str, value: i64 },

  #[error("database file not found: {0}")]
  MissingDatabase(PathBuf),

  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// An applied migration script no longer matches what was applied.
  #[error("migration {0} was modified after it was applied")]
  ChecksumMismatch(String),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
