//! Maintenance configuration.
//!
//! Deserialised by the binary from `quill.toml` and `QUILL_*` environment
//! variables; every field has a default so an empty configuration works.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
  /// `file:` connection string of the live database.
  pub database_url:          String,
  /// Directory relative `file:` paths are resolved against.
  pub database_base_dir:     PathBuf,
  pub backup_dir:            PathBuf,
  /// Backups older than this many days are deleted; 0 keeps nothing older
  /// than the moment cleanup runs.
  pub backup_retention_days: u32,
  /// Time of day for the scheduled backup, `HH:MM` 24h local time.
  pub backup_schedule:       String,
  pub migrations_dir:        PathBuf,
  pub migration_history_dir: PathBuf,
  pub stats_lookback_days:   u32,
}

impl Default for OpsConfig {
  fn default() -> Self {
    Self {
      database_url:          "file:./dev.db".to_string(),
      database_base_dir:     PathBuf::from("prisma"),
      backup_dir:            PathBuf::from("backups"),
      backup_retention_days: 7,
      backup_schedule:       "04:00".to_string(),
      migrations_dir:        PathBuf::from("prisma/migrations"),
      migration_history_dir: PathBuf::from("backups/migrations"),
      stats_lookback_days:   365,
    }
  }
}

impl OpsConfig {
  /// Path of the live database file.
  pub fn database_path(&self) -> Result<PathBuf> {
    resolve_database_url(&self.database_url, &self.database_base_dir)
  }
}

/// Resolve a `file:` connection string to a path.
///
/// Relative paths are taken relative to `base_dir`, absolute ones are kept,
/// and any `?key=value` suffix is dropped.
pub fn resolve_database_url(url: &str, base_dir: &Path) -> Result<PathBuf> {
  let invalid = || Error::InvalidDatabaseUrl(url.to_owned());

  let rest = url.trim().strip_prefix("file:").ok_or_else(invalid)?;
  let rest = rest.split('?').next().unwrap_or_default();
  let rest = rest.strip_prefix("//").unwrap_or(rest);
  if rest.is_empty() {
    return Err(invalid());
  }

  let path = Path::new(rest);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }
  let path = path.strip_prefix(".").unwrap_or(path);
  Ok(base_dir.join(path))
}
