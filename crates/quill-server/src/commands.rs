//! One function per subcommand. Results are printed to stdout as JSON.

use std::sync::Arc;

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use quill_api::{AppState, AuthConfig};
use quill_core::{report::RecalcKind, stat::parse_date};
use quill_ops::{
  Error, backup::BackupEngine, migrate::MigrationOrchestrator, schedule, stats::StatsService,
};
use quill_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn backups(cfg: &ServerConfig) -> anyhow::Result<Arc<BackupEngine>> {
  Ok(Arc::new(BackupEngine::new(&cfg.ops).context("invalid database_url")?))
}

async fn stats(cfg: &ServerConfig) -> anyhow::Result<StatsService<SqliteStore>> {
  let path  = cfg.ops.database_path().context("invalid database_url")?;
  let store = SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open database at {}", path.display()))?;
  Ok(StatsService::new(Arc::new(store)))
}

fn orchestrator(
  cfg: &ServerConfig,
  backups: Arc<BackupEngine>,
) -> anyhow::Result<MigrationOrchestrator> {
  MigrationOrchestrator::from_config(&cfg.ops, backups).context("invalid database_url")
}

// ─── Server ───────────────────────────────────────────────────────────────────

pub async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  anyhow::ensure!(
    !cfg.admin_password_hash.is_empty(),
    "admin_password_hash is not set; generate one with `quill hash-password`"
  );

  let backups = backups(&cfg)?;
  let state   = AppState {
    stats:         Arc::new(stats(&cfg).await?),
    migrations:    Arc::new(orchestrator(&cfg, backups.clone())?),
    backups:       backups.clone(),
    auth:          Arc::new(AuthConfig {
      username:      cfg.admin_username.clone(),
      password_hash: cfg.admin_password_hash.clone(),
    }),
    lookback_days: cfg.ops.stats_lookback_days,
  };

  let timer = schedule::schedule_from_config(backups, &cfg.ops)?;

  let app     = quill_api::admin_router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let served = axum::serve(listener, app).await.context("server error");
  timer.abort();
  served
}

// ─── Backups ──────────────────────────────────────────────────────────────────

pub async fn backup(cfg: &ServerConfig) -> anyhow::Result<()> {
  let filename = backups(cfg)?.backup_once().await.context("backup failed")?;
  print_json(&serde_json::json!({ "filename": filename }))
}

pub async fn list_backups(cfg: &ServerConfig) -> anyhow::Result<()> {
  print_json(&backups(cfg)?.list_backups().await?)
}

pub async fn cleanup(cfg: &ServerConfig) -> anyhow::Result<()> {
  let deleted = backups(cfg)?.cleanup_backups().await.context("cleanup failed")?;
  print_json(&serde_json::json!({ "deleted": deleted }))
}

pub async fn restore(cfg: &ServerConfig, file: &str) -> anyhow::Result<()> {
  let engine = backups(cfg)?;
  if let Err(e) = engine.restore_backup(file).await {
    eprintln!("restore failed: {e}");
    eprintln!("run `quill backups` to see the available backup files");
    return Err(e).context("restore failed");
  }
  print_json(&serde_json::json!({ "restored": file }))
}

// ─── Migrations ───────────────────────────────────────────────────────────────

pub async fn migrate(cfg: &ServerConfig, name: Option<&str>) -> anyhow::Result<()> {
  let orchestrator = orchestrator(cfg, backups(cfg)?)?;
  match orchestrator.safe_migrate(name).await {
    Ok(outcome) => print_json(&outcome),
    Err(e) => {
      eprintln!("migration failed: {e}");
      let backed_up = !matches!(e, Error::BackupRequired(_) | Error::InvalidMigrationName(_));
      if backed_up
        && let Ok(records) = orchestrator.migration_history().await
        && let Some(last) = records.first()
      {
        eprintln!(
          "the database was backed up first; roll back with `quill restore {}`",
          last.backup_file
        );
      }
      Err(e).context("migration failed")
    }
  }
}

pub async fn deploy(cfg: &ServerConfig) -> anyhow::Result<()> {
  let applied = orchestrator(cfg, backups(cfg)?)?
    .apply_migration()
    .await
    .context("deploy failed")?;
  print_json(&serde_json::json!({ "applied": applied }))
}

pub async fn history(cfg: &ServerConfig) -> anyhow::Result<()> {
  print_json(&orchestrator(cfg, backups(cfg)?)?.migration_history().await?)
}

// ─── Statistics ───────────────────────────────────────────────────────────────

pub async fn recalc(
  cfg: &ServerConfig,
  kind: &str,
  days: Option<u32>,
  until: Option<&str>,
) -> anyhow::Result<()> {
  let kind    = RecalcKind::parse(kind)?;
  let days    = days.unwrap_or(cfg.ops.stats_lookback_days);
  let service = stats(cfg).await?;
  let today   = match until {
    Some(s) => parse_date(s)?,
    None => service.today(),
  };
  let summary = service
    .recalculate_until(kind, today, days)
    .await
    .context("recalculation failed")?;
  print_json(&summary)
}

pub async fn verify(cfg: &ServerConfig) -> anyhow::Result<()> {
  let report = stats(cfg).await?.verify_data_integrity().await?;
  print_json(&report)?;
  anyhow::ensure!(report.valid, "integrity check failed; run `quill recalc --type daily` to rebuild");
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub fn hash_password() -> anyhow::Result<()> {
  let password = read_password()?;
  let salt     = SaltString::generate(&mut OsRng);
  let hash     = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();
  println!("{hash}");
  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
