//! Durable log of migration attempts, one JSON file per attempt.

use std::path::{Path, PathBuf};

use chrono::Local;
use quill_core::maintenance::MigrationRecord;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::{Error, FILE_TIMESTAMP, Result};

pub struct MigrationHistory {
  dir: PathBuf,
}

impl MigrationHistory {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  pub fn dir(&self) -> &Path { &self.dir }

  /// Persist `record` as `{name}-{YYYYMMDDHHMMSS}.json` and return its path.
  ///
  /// Files are created exclusively; a second attempt in the same second gets
  /// a `-1`, `-2`, … suffix.
  pub async fn record(&self, record: &MigrationRecord) -> Result<PathBuf> {
    fs::create_dir_all(&self.dir).await.map_err(|e| Error::io(&self.dir, e))?;

    let stamp = record.timestamp.with_timezone(&Local).format(FILE_TIMESTAMP).to_string();
    let base  = format!("{}-{stamp}", record.name);

    let mut attempt = 0u32;
    let (path, mut file) = loop {
      let name = match attempt {
        0 => format!("{base}.json"),
        n => format!("{base}-{n}.json"),
      };
      let path = self.dir.join(name);
      match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
        Ok(file) => break (path, file),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
        Err(e) => return Err(Error::io(&path, e)),
      }
    };

    let json = serde_json::to_vec_pretty(record)
      .map_err(|source| Error::Json { path: path.clone(), source })?;
    file.write_all(&json).await.map_err(|e| Error::io(&path, e))?;
    file.sync_all().await.map_err(|e| Error::io(&path, e))?;

    debug!(path = %path.display(), status = %record.status, "migration recorded");
    Ok(path)
  }

  /// Every readable record, newest first. Files that fail to read or parse
  /// are logged and skipped.
  pub async fn list(&self) -> Result<Vec<MigrationRecord>> {
    let mut entries = match fs::read_dir(&self.dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::io(&self.dir, e)),
    };

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&self.dir, e))? {
      let path = entry.path();
      if path.extension().is_none_or(|ext| ext != "json") {
        continue;
      }
      match read_record(&path).await {
        Ok(record) => records.push(record),
        Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable migration record"),
      }
    }

    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(records)
  }
}

async fn read_record(path: &Path) -> Result<MigrationRecord> {
  let bytes = fs::read(path).await.map_err(|e| Error::io(path, e))?;
  serde_json::from_slice(&bytes).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, Utc};
  use quill_core::maintenance::MigrationStatus;

  use super::*;

  fn record(name: &str, status: MigrationStatus) -> MigrationRecord {
    MigrationRecord {
      name:        name.into(),
      backup_file: "dev-20240101040000.db".into(),
      status,
      error:       None,
      timestamp:   Utc::now(),
      database:    "dev.db".into(),
    }
  }

  #[tokio::test]
  async fn same_second_records_do_not_collide() {
    let tmp     = tempfile::tempdir().unwrap();
    let history = MigrationHistory::new(tmp.path().join("migrations"));
    let rec     = record("add_tags", MigrationStatus::Success);

    let first  = history.record(&rec).await.unwrap();
    let second = history.record(&rec).await.unwrap();
    assert_ne!(first, second);
    assert!(second.to_string_lossy().ends_with("-1.json"));
    assert_eq!(history.list().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn lists_newest_first_and_skips_garbage() {
    let tmp     = tempfile::tempdir().unwrap();
    let history = MigrationHistory::new(tmp.path());

    let mut old = record("first", MigrationStatus::Success);
    old.timestamp -= TimeDelta::hours(1);
    history.record(&old).await.unwrap();
    history.record(&record("second", MigrationStatus::Failed)).await.unwrap();
    std::fs::write(tmp.path().join("broken.json"), b"{not json").unwrap();
    std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

    let names: Vec<_> = history.list().await.unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, ["second", "first"]);
  }

  #[tokio::test]
  async fn missing_directory_is_empty_history() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(MigrationHistory::new(tmp.path().join("none")).list().await.unwrap().is_empty());
  }
}
