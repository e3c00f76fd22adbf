//! Backups of the live database file: snapshot, retention, listing and
//! restore.

use std::{
  path::{Path, PathBuf},
  sync::LazyLock,
  time::{Duration, SystemTime},
};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use quill_core::maintenance::BackupArtifact;
use quill_store_sqlite::file_ops;
use regex::Regex;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{BestEffort, Error, FILE_TIMESTAMP, OpsConfig, Result};

/// Names a restore or cleanup is allowed to touch.
static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9._-]+\.(db|sql|json)$").expect("backup name pattern is valid")
});

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// `{stem}-{YYYYMMDDHHMMSS}.db`.
pub fn backup_file_name(stem: &str, at: NaiveDateTime) -> String {
  format!("{stem}-{}.db", at.format(FILE_TIMESTAMP))
}

/// Check `filename` against the allow-list. Touches nothing on disk.
pub fn validate_backup_name(filename: &str) -> Result<()> {
  if BACKUP_NAME.is_match(filename) {
    Ok(())
  } else {
    Err(Error::InvalidBackupName(filename.to_owned()))
  }
}

/// What one scheduled cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
  pub backup:  String,
  pub deleted: usize,
}

pub struct BackupEngine {
  database:       PathBuf,
  backup_dir:     PathBuf,
  retention_days: u32,
}

impl BackupEngine {
  pub fn new(config: &OpsConfig) -> Result<Self> {
    Ok(Self::with_paths(
      config.database_path()?,
      config.backup_dir.clone(),
      config.backup_retention_days,
    ))
  }

  pub fn with_paths(
    database: impl Into<PathBuf>,
    backup_dir: impl Into<PathBuf>,
    retention_days: u32,
  ) -> Self {
    Self { database: database.into(), backup_dir: backup_dir.into(), retention_days }
  }

  pub fn database_path(&self) -> &Path { &self.database }

  pub fn backup_dir(&self) -> &Path { &self.backup_dir }

  /// File name of the live database, recorded alongside migrations.
  pub fn database_name(&self) -> String {
    self
      .database
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default()
  }

  fn stem(&self) -> String {
    self
      .database
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "database".to_string())
  }

  // ─── Backup ──────────────────────────────────────────────────────────────

  /// Flush the write-ahead log into the main file. Failure is tolerated.
  pub async fn checkpoint(&self) -> BestEffort<()> {
    BestEffort::from_result("wal checkpoint", file_ops::checkpoint(&self.database).await)
  }

  /// Take one backup and return its file name.
  ///
  /// Prefers an atomic `VACUUM INTO` snapshot and falls back to copying the
  /// file byte for byte. An existing file with the same name is never
  /// overwritten.
  pub async fn backup_once(&self) -> Result<String> {
    self.checkpoint().await;

    let filename = backup_file_name(&self.stem(), Local::now().naive_local());
    fs::create_dir_all(&self.backup_dir)
      .await
      .map_err(|e| Error::io(&self.backup_dir, e))?;

    let target = self.backup_dir.join(&filename);
    if fs::try_exists(&target).await.map_err(|e| Error::io(&target, e))? {
      return Err(Error::BackupExists(filename));
    }

    match BestEffort::from_result("snapshot", self.snapshot(&target).await) {
      BestEffort::Completed(()) => {}
      BestEffort::Swallowed { reason, .. } => {
        // VACUUM INTO can leave a partial file behind.
        let _ = fs::remove_file(&target).await;
        if let Err(e) = self.copy_to(&target).await {
          return Err(Error::BackupFailed { snapshot: reason, copy: e.to_string() });
        }
        info!(filename = %filename, "backup written by file copy");
      }
    }

    info!(filename = %filename, "backup created");
    Ok(filename)
  }

  async fn snapshot(&self, target: &Path) -> Result<()> {
    file_ops::vacuum_into(&self.database, target).await?;
    if !fs::try_exists(target).await.map_err(|e| Error::io(target, e))? {
      return Err(Error::io(
        target,
        std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot produced no file"),
      ));
    }
    Ok(())
  }

  async fn copy_to(&self, target: &Path) -> Result<()> {
    let mut source = fs::File::open(&self.database)
      .await
      .map_err(|e| Error::io(&self.database, e))?;
    let mut dest = fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(target)
      .await
      .map_err(|e| Error::io(target, e))?;
    tokio::io::copy(&mut source, &mut dest).await.map_err(|e| Error::io(target, e))?;
    dest.sync_all().await.map_err(|e| Error::io(target, e))?;
    Ok(())
  }

  // ─── Retention ───────────────────────────────────────────────────────────

  pub async fn cleanup_backups(&self) -> Result<usize> {
    self.cleanup_backups_at(SystemTime::now()).await
  }

  /// Delete backups last modified before `now - retention_days` and return
  /// how many were removed.
  pub async fn cleanup_backups_at(&self, now: SystemTime) -> Result<usize> {
    let retention = Duration::from_secs(u64::from(self.retention_days) * SECS_PER_DAY);
    let cutoff    = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0;
    for (path, meta) in self.backup_files().await? {
      let modified = meta.modified().map_err(|e| Error::io(&path, e))?;
      if modified < cutoff {
        fs::remove_file(&path).await.map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "expired backup removed");
        deleted += 1;
      }
    }

    info!(deleted, retention_days = self.retention_days, "backup cleanup complete");
    Ok(deleted)
  }

  /// Backups on disk, newest first.
  pub async fn list_backups(&self) -> Result<Vec<BackupArtifact>> {
    let mut artifacts = Vec::new();
    for (path, meta) in self.backup_files().await? {
      let modified = meta.modified().map_err(|e| Error::io(&path, e))?;
      artifacts.push(BackupArtifact {
        filename:   path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        size:       meta.len(),
        created_at: DateTime::<Utc>::from(modified),
      });
    }
    artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.filename.cmp(&a.filename)));
    Ok(artifacts)
  }

  /// Regular files in the backup directory whose names pass the allow-list.
  async fn backup_files(&self) -> Result<Vec<(PathBuf, std::fs::Metadata)>> {
    let dir = &self.backup_dir;
    let mut entries = match fs::read_dir(dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(Error::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
      let name = entry.file_name();
      if !BACKUP_NAME.is_match(&name.to_string_lossy()) {
        continue;
      }
      let path = entry.path();
      let meta = entry.metadata().await.map_err(|e| Error::io(&path, e))?;
      if meta.is_file() {
        files.push((path, meta));
      }
    }
    Ok(files)
  }

  // ─── Restore ─────────────────────────────────────────────────────────────

  /// Replace the live database contents with the backup `filename`.
  ///
  /// The name is validated before anything on disk is touched. Runs through
  /// SQLite's online backup API, so a busy database fails the restore
  /// rather than mixing old and new pages.
  pub async fn restore_backup(&self, filename: &str) -> Result<()> {
    validate_backup_name(filename)?;
    if !filename.ends_with(".db") {
      return Err(Error::UnsupportedBackupFormat(filename.to_owned()));
    }

    let path = self.backup_dir.join(filename);
    if !fs::try_exists(&path).await.map_err(|e| Error::io(&path, e))? {
      return Err(Error::BackupNotFound(filename.to_owned()));
    }
    let dir  = fs::canonicalize(&self.backup_dir).await.map_err(|e| Error::io(&self.backup_dir, e))?;
    let path = fs::canonicalize(&path).await.map_err(|e| Error::io(&path, e))?;
    if !path.starts_with(&dir) {
      return Err(Error::InvalidBackupName(filename.to_owned()));
    }

    warn!(filename, database = %self.database.display(), "restoring database from backup");
    file_ops::restore_from(&self.database, &path).await?;
    info!(filename, "database restored");
    Ok(())
  }

  // ─── Cycle ───────────────────────────────────────────────────────────────

  /// One backup followed by retention cleanup. Never fails; a failure is
  /// logged and reported as swallowed.
  pub async fn run_cycle(&self) -> BestEffort<CycleReport> {
    BestEffort::from_result("backup cycle", self.try_cycle().await)
  }

  async fn try_cycle(&self) -> Result<CycleReport> {
    let backup  = self.backup_once().await?;
    let deleted = self.cleanup_backups().await?;
    Ok(CycleReport { backup, deleted })
  }
}
