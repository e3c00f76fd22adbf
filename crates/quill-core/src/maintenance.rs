//! Backup artifacts and migration history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// A point-in-time copy of the database file in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupArtifact {
  /// `{db-stem}-{YYYYMMDDHHMMSS}.db`; never a path.
  pub filename:   String,
  pub size:       u64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MigrationStatus {
  Success,
  Failed,
}

/// One migration attempt, as persisted to the history directory.
///
/// Serialised as `{name, backupFile, status, error, timestamp, database}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
  pub name:        String,
  /// Filename of the backup taken before the attempt.
  pub backup_file: String,
  pub status:      MigrationStatus,
  pub error:       Option<String>,
  pub timestamp:   DateTime<Utc>,
  /// File name of the live database the migration ran against.
  pub database:    String,
}

/// Returned by a successful guarded migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateOutcome {
  pub success:   bool,
  pub migration: String,
  pub backup:    String,
  /// Ids of the scripts the tool applied; empty when already in sync.
  pub applied:   Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_uses_camel_case_keys() {
    let record = MigrationRecord {
      name:        "add_tags".into(),
      backup_file: "dev-20240101040000.db".into(),
      status:      MigrationStatus::Failed,
      error:       Some("syntax error".into()),
      timestamp:   Utc::now(),
      database:    "dev.db".into(),
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["backupFile"], "dev-20240101040000.db");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"], "syntax error");

    let back: MigrationRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
  }
}
