//! Backup-guarded schema migrations.
//!
//! Every migration runs as BACKUP → DIFF → APPLY → RECORD. The backup is
//! mandatory: without one the migration never starts. The diff is purely
//! informational. Whatever APPLY does, the attempt is written to the
//! [`MigrationHistory`], and a failed attempt names the backup to restore.

use std::{
  future::Future,
  path::{Path, PathBuf},
  sync::{Arc, LazyLock},
};

use chrono::{Local, Utc};
use quill_core::maintenance::{MigrateOutcome, MigrationRecord, MigrationStatus};
use quill_store_sqlite::migrations;
use regex::Regex;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info};

use crate::{
  BestEffort, Error, FILE_TIMESTAMP, OpsConfig, Result, backup::BackupEngine,
  history::MigrationHistory,
};

/// File in the migrations directory holding the next migration's SQL until
/// it is given a name.
pub const DRAFT_NAME: &str = "draft.sql";

static MIGRATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9_-]+$").expect("migration name pattern is valid")
});

// ─── Tool seam ───────────────────────────────────────────────────────────────

/// The external schema-migration tool.
pub trait MigrationTool: Send + Sync {
  /// Describe how the schema differs from the migration history.
  fn diff(&self) -> impl Future<Output = Result<String>> + Send + '_;

  /// Development mode: create a migration called `name` from pending schema
  /// changes and apply it. Returns the ids applied.
  fn create_and_apply<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  /// Production mode: apply already-created migrations only.
  fn deploy(&self) -> impl Future<Output = Result<Vec<String>>> + Send + '_;
}

/// Built-in [`MigrationTool`] over a directory of SQL scripts.
pub struct SqlMigrator {
  database:       PathBuf,
  migrations_dir: PathBuf,
}

impl SqlMigrator {
  pub fn new(database: impl Into<PathBuf>, migrations_dir: impl Into<PathBuf>) -> Self {
    Self { database: database.into(), migrations_dir: migrations_dir.into() }
  }

  fn draft_path(&self) -> PathBuf { self.migrations_dir.join(DRAFT_NAME) }

  /// Contents of the draft, if there is a non-blank one.
  async fn read_draft(&self) -> Result<Option<String>> {
    let path = self.draft_path();
    match fs::read_to_string(&path).await {
      Ok(sql) if !sql.trim().is_empty() => Ok(Some(sql)),
      Ok(_) => Ok(None),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(Error::io(&path, e)),
    }
  }

  /// Move the draft into `<dir>/<timestamp>_<name>/migration.sql`.
  async fn promote_draft(&self, name: &str, sql: &str) -> Result<String> {
    let id     = format!("{}_{name}", Local::now().format(FILE_TIMESTAMP));
    let script = migrations::script_path(&self.migrations_dir, &id);
    if let Some(parent) = script.parent() {
      fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
    }

    let mut file = fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&script)
      .await
      .map_err(|e| Error::io(&script, e))?;
    file.write_all(sql.as_bytes()).await.map_err(|e| Error::io(&script, e))?;
    file.sync_all().await.map_err(|e| Error::io(&script, e))?;

    let draft = self.draft_path();
    fs::remove_file(&draft).await.map_err(|e| Error::io(&draft, e))?;
    info!(migration = %id, "draft promoted to migration");
    Ok(id)
  }
}

impl MigrationTool for SqlMigrator {
  fn diff(&self) -> impl Future<Output = Result<String>> + Send + '_ {
    async move {
      let pending = migrations::pending(&self.database, &self.migrations_dir).await?;
      let draft   = self.read_draft().await?.is_some();
      let mut out = match pending.as_slice() {
        [] => "no pending migrations".to_string(),
        ids => format!("pending migrations: {}", ids.join(", ")),
      };
      if draft {
        out.push_str(&format!("; unapplied changes in {DRAFT_NAME}"));
      }
      Ok(out)
    }
  }

  fn create_and_apply<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a {
    async move {
      if let Some(sql) = self.read_draft().await? {
        self.promote_draft(name, &sql).await?;
      }
      Ok(migrations::apply_pending(&self.database, &self.migrations_dir).await?)
    }
  }

  fn deploy(&self) -> impl Future<Output = Result<Vec<String>>> + Send + '_ {
    async move { Ok(migrations::apply_pending(&self.database, &self.migrations_dir).await?) }
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Letters, digits, `_` and `-` only; the name ends up in a directory name.
pub fn validate_migration_name(name: &str) -> Result<()> {
  if MIGRATION_NAME.is_match(name) {
    Ok(())
  } else {
    Err(Error::InvalidMigrationName(name.to_owned()))
  }
}

pub struct MigrationOrchestrator<T = SqlMigrator> {
  backups: Arc<BackupEngine>,
  tool:    T,
  history: MigrationHistory,
}

impl MigrationOrchestrator {
  /// The orchestrator over the built-in [`SqlMigrator`].
  pub fn from_config(config: &OpsConfig, backups: Arc<BackupEngine>) -> Result<Self> {
    let tool = SqlMigrator::new(config.database_path()?, config.migrations_dir.clone());
    Ok(Self::new(backups, tool, MigrationHistory::new(config.migration_history_dir.clone())))
  }
}

impl<T: MigrationTool> MigrationOrchestrator<T> {
  pub fn new(backups: Arc<BackupEngine>, tool: T, history: MigrationHistory) -> Self {
    Self { backups, tool, history }
  }

  pub fn history_dir(&self) -> &Path { self.history.dir() }

  /// Take the mandatory pre-migration backup.
  pub async fn backup_before_migration(&self) -> Result<String> {
    match self.backups.backup_once().await {
      Ok(filename) => {
        info!(backup = %filename, "pre-migration backup created");
        Ok(filename)
      }
      Err(e) => {
        error!(error = %e, "pre-migration backup failed; migration aborted");
        Err(Error::BackupRequired(Box::new(e)))
      }
    }
  }

  /// Development-mode migration guarded by a backup and recorded in the
  /// history. Without a name one is generated as `migration_<timestamp>`.
  ///
  /// On failure the original tool error is returned after the failed
  /// attempt is recorded.
  pub async fn safe_migrate(&self, name: Option<&str>) -> Result<MigrateOutcome> {
    let name = match name {
      Some(name) => {
        validate_migration_name(name)?;
        name.to_owned()
      }
      None => format!("migration_{}", Local::now().format(FILE_TIMESTAMP)),
    };

    let backup = self.backup_before_migration().await?;

    if let BestEffort::Completed(diff) = BestEffort::from_result("schema diff", self.tool.diff().await)
    {
      info!(migration = %name, %diff, "schema diff");
    }

    match self.tool.create_and_apply(&name).await {
      Ok(applied) => {
        self.record(&name, &backup, MigrationStatus::Success, None).await;
        info!(migration = %name, applied = applied.len(), "migration complete");
        Ok(MigrateOutcome { success: true, migration: name, backup, applied })
      }
      Err(e) => {
        self.record(&name, &backup, MigrationStatus::Failed, Some(e.to_string())).await;
        error!(
          migration = %name,
          backup = %backup,
          error = %e,
          "migration failed; restore the backup to roll back"
        );
        Err(e)
      }
    }
  }

  /// Write one history record. The migration outcome stands even when the
  /// record cannot be written.
  async fn record(
    &self,
    name: &str,
    backup: &str,
    status: MigrationStatus,
    error: Option<String>,
  ) {
    let record = MigrationRecord {
      name:        name.to_owned(),
      backup_file: backup.to_owned(),
      status,
      error,
      timestamp:   Utc::now(),
      database:    self.backups.database_name(),
    };
    if let Err(e) = self.history.record(&record).await {
      error!(migration = %name, error = %e, "failed to write migration history");
    }
  }

  /// Every recorded attempt, newest first.
  pub async fn migration_history(&self) -> Result<Vec<MigrationRecord>> { self.history.list().await }

  /// Production-mode deploy of already-created migrations.
  pub async fn apply_migration(&self) -> Result<Vec<String>> {
    match self.tool.deploy().await {
      Ok(applied) => {
        info!(applied = applied.len(), "migrations deployed");
        Ok(applied)
      }
      Err(e) => {
        error!(error = %e, "migration deploy failed");
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use quill_store_sqlite::SqliteStore;

  use super::*;

  struct Fixture {
    _tmp:       tempfile::TempDir,
    db:         PathBuf,
    backups:    Arc<BackupEngine>,
    migrations: PathBuf,
    history:    PathBuf,
  }

  async fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let db  = tmp.path().join("dev.db");
    SqliteStore::open(&db).await.unwrap();
    Fixture {
      backups: Arc::new(BackupEngine::with_paths(&db, tmp.path().join("backups"), 7)),
      migrations: tmp.path().join("migrations"),
      history: tmp.path().join("backups").join("migrations"),
      db,
      _tmp: tmp,
    }
  }

  impl Fixture {
    fn sql(&self) -> MigrationOrchestrator {
      MigrationOrchestrator::new(
        self.backups.clone(),
        SqlMigrator::new(&self.db, &self.migrations),
        MigrationHistory::new(&self.history),
      )
    }

    fn scripted(&self, tool: ScriptedTool) -> MigrationOrchestrator<ScriptedTool> {
      MigrationOrchestrator::new(self.backups.clone(), tool, MigrationHistory::new(&self.history))
    }
  }

  #[derive(Default)]
  struct ScriptedTool {
    diff_fails:  bool,
    apply_fails: bool,
  }

  impl MigrationTool for ScriptedTool {
    fn diff(&self) -> impl Future<Output = Result<String>> + Send + '_ {
      async move {
        if self.diff_fails {
          return Err(Error::Migration("diff unavailable".into()));
        }
        Ok("no changes".into())
      }
    }

    fn create_and_apply<'a>(
      &'a self,
      name: &'a str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a {
      async move {
        if self.apply_fails {
          return Err(Error::Migration(format!("cannot apply {name}")));
        }
        Ok(vec![name.to_owned()])
      }
    }

    fn deploy(&self) -> impl Future<Output = Result<Vec<String>>> + Send + '_ {
      async move { Ok(Vec::new()) }
    }
  }

  #[test]
  fn migration_names() {
    for ok in ["add_tags", "visit-referrer", "V2"] {
      assert!(validate_migration_name(ok).is_ok(), "{ok}");
    }
    for bad in ["", "add tags", "../up", "tags.sql", "tags\n", "ünicode"] {
      assert!(matches!(validate_migration_name(bad), Err(Error::InvalidMigrationName(_))), "{bad}");
    }
  }

  #[tokio::test]
  async fn draft_becomes_an_applied_migration() {
    let fx = fixture().await;
    std::fs::create_dir_all(&fx.migrations).unwrap();
    std::fs::write(fx.migrations.join(DRAFT_NAME), "ALTER TABLE posts ADD COLUMN tags TEXT;")
      .unwrap();

    let outcome = fx.sql().safe_migrate(Some("add_tags")).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.applied.len(), 1);
    assert!(outcome.applied[0].ends_with("_add_tags"));
    assert!(fx.backups.backup_dir().join(&outcome.backup).exists());
    assert!(!fx.migrations.join(DRAFT_NAME).exists());

    let history = fx.sql().migration_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MigrationStatus::Success);
    assert_eq!(history[0].backup_file, outcome.backup);
    assert_eq!(history[0].database, "dev.db");
  }

  #[tokio::test]
  async fn failed_apply_is_recorded_and_backup_is_restorable() {
    let fx  = fixture().await;
    let orc = fx.scripted(ScriptedTool { apply_fails: true, ..Default::default() });

    let err = orc.safe_migrate(Some("broken")).await.unwrap_err();
    assert!(matches!(err, Error::Migration(_)));

    let history = orc.migration_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MigrationStatus::Failed);
    assert!(history[0].error.as_deref().unwrap().contains("cannot apply broken"));

    let backup = &history[0].backup_file;
    assert!(fx.backups.backup_dir().join(backup).exists());
    fx.backups.restore_backup(backup).await.unwrap();
  }

  #[tokio::test]
  async fn no_backup_no_migration() {
    let tmp     = tempfile::tempdir().unwrap();
    let backups = Arc::new(BackupEngine::with_paths(tmp.path().join("gone.db"), tmp.path(), 7));
    let history = tmp.path().join("history");
    let orc     = MigrationOrchestrator::new(
      backups,
      ScriptedTool::default(),
      MigrationHistory::new(&history),
    );

    let err = orc.safe_migrate(Some("anything")).await.unwrap_err();
    assert!(matches!(err, Error::BackupRequired(_)));
    assert!(err.to_string().starts_with("backup required before migration"));
    assert!(!history.exists());
  }

  #[tokio::test]
  async fn invalid_name_is_rejected_before_backup() {
    let fx = fixture().await;
    for bad in ["../evil", "add tags", ""] {
      assert!(matches!(
        fx.sql().safe_migrate(Some(bad)).await,
        Err(Error::InvalidMigrationName(_))
      ));
    }
    assert!(!fx.backups.backup_dir().exists());
  }

  #[tokio::test]
  async fn failing_diff_does_not_stop_migration() {
    let fx  = fixture().await;
    let orc = fx.scripted(ScriptedTool { diff_fails: true, ..Default::default() });

    let outcome = orc.safe_migrate(None).await.unwrap();
    assert!(outcome.migration.starts_with("migration_"));
    assert_eq!(outcome.applied, [outcome.migration.clone()]);
  }

  #[tokio::test]
  async fn deploy_applies_existing_scripts_only() {
    let fx     = fixture().await;
    let script = migrations::script_path(&fx.migrations, "20240101000000_visit_referrer");
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "ALTER TABLE visits ADD COLUMN referrer TEXT;").unwrap();
    std::fs::write(fx.migrations.join(DRAFT_NAME), "ALTER TABLE posts ADD COLUMN x TEXT;").unwrap();

    let orc = fx.sql();
    assert!(orc.tool.diff().await.unwrap().contains("20240101000000_visit_referrer"));
    assert_eq!(orc.apply_migration().await.unwrap(), ["20240101000000_visit_referrer"]);
    assert!(orc.apply_migration().await.unwrap().is_empty());
    assert!(fx.migrations.join(DRAFT_NAME).exists());
    assert!(orc.migration_history().await.unwrap().is_empty());
  }
}
