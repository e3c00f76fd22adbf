//! Error type for `quill-ops`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] quill_store_sqlite::Error),

  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("json error in {path}: {source}")]
  Json {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported database url {0:?}: expected a file: connection string")]
  InvalidDatabaseUrl(String),

  /// Rejected before any file-system access.
  #[error("invalid backup file name {0:?}")]
  InvalidBackupName(String),

  #[error("backup {0:?} is not a restorable database snapshot")]
  UnsupportedBackupFormat(String),

  #[error("backup not found: {0}")]
  BackupNotFound(String),

  #[error("backup {0} already exists")]
  BackupExists(String),

  #[error("backup failed (snapshot: {snapshot}; copy: {copy})")]
  BackupFailed { snapshot: String, copy: String },

  #[error("backup required before migration: {0}")]
  BackupRequired(#[source] Box<Error>),

  #[error("lookback of {0} days reaches before the earliest representable date")]
  LookbackOutOfRange(u32),

  #[error("rollup window ending {0} runs past the latest representable date")]
  DateOutOfRange(chrono::NaiveDate),

  #[error("invalid backup schedule {0:?}: expected HH:MM (24h)")]
  InvalidSchedule(String),

  #[error("invalid migration name {0:?}: use letters, digits, '_' or '-'")]
  InvalidMigrationName(String),

  #[error("migration tool failed: {0}")]
  Migration(String),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
