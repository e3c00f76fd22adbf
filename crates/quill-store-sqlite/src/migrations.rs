//! Directory-based schema migrations.
//!
//! A migrations directory holds one sub-directory per migration:
//!
//! ```text
//! migrations/
//!   20240101040000_add_tags/migration.sql
//!   20240302120000_visit_referrer/migration.sql
//! ```
//!
//! Directory names sort chronologically and double as migration ids. Applied
//! ids are tracked in `_quill_migrations` together with a SHA-256 of the
//! script, so an edited script that was already applied is detected instead
//! of silently diverging.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{Error, Result, encode::encode_dt, file_ops::open_existing};

/// File name of the script inside each migration directory.
pub const SCRIPT_NAME: &str = "migration.sql";

const TRACKING_TABLE: &str = "
CREATE TABLE IF NOT EXISTS _quill_migrations (
    id          TEXT PRIMARY KEY,
    checksum    TEXT NOT NULL,
    applied_at  TEXT NOT NULL
);
";

/// One migration script loaded from disk.
#[derive(Debug, Clone)]
pub struct MigrationScript {
  pub id:       String,
  pub sql:      String,
  pub checksum: String,
}

fn checksum(sql: &str) -> String { hex::encode(Sha256::digest(sql.as_bytes())) }

/// Load every `<dir>/<id>/migration.sql`, sorted by id. A missing directory
/// means there are no migrations. Plain files next to the migration
/// directories (a pending `draft.sql`, a `migration_lock.toml`) are ignored.
pub async fn load_scripts(dir: &Path) -> Result<Vec<MigrationScript>> {
  let mut entries = match tokio::fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(Error::io(dir, e)),
  };

  let mut scripts = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
    let file_type = entry.file_type().await.map_err(|e| Error::io(entry.path(), e))?;
    if !file_type.is_dir() {
      continue;
    }
    let script_path = entry.path().join(SCRIPT_NAME);
    if !tokio::fs::try_exists(&script_path).await.map_err(|e| Error::io(&script_path, e))? {
      continue;
    }
    let sql = tokio::fs::read_to_string(&script_path)
      .await
      .map_err(|e| Error::io(&script_path, e))?;
    scripts.push(MigrationScript {
      id: entry.file_name().to_string_lossy().into_owned(),
      checksum: checksum(&sql),
      sql,
    });
  }

  scripts.sort_by(|a, b| a.id.cmp(&b.id));
  Ok(scripts)
}

/// Split `scripts` into the ones still to apply, failing on checksum drift.
fn pending_of(
  scripts: Vec<MigrationScript>,
  applied: &HashMap<String, String>,
) -> Result<Vec<MigrationScript>> {
  let mut pending = Vec::new();
  for script in scripts {
    match applied.get(&script.id) {
      Some(sum) if *sum == script.checksum => {}
      Some(_) => return Err(Error::ChecksumMismatch(script.id)),
      None => pending.push(script),
    }
  }
  Ok(pending)
}

async fn applied_checksums(conn: &tokio_rusqlite::Connection) -> Result<HashMap<String, String>> {
  let applied = conn
    .call(|conn| {
      conn.execute_batch(TRACKING_TABLE)?;
      let mut stmt = conn.prepare("SELECT id, checksum FROM _quill_migrations")?;
      let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
      Ok(rows)
    })
    .await?;
  Ok(applied)
}

/// Ids of migrations in `dir` not yet applied to the database at `db_path`.
/// The database must already exist.
pub async fn pending(db_path: &Path, dir: &Path) -> Result<Vec<String>> {
  let scripts = load_scripts(dir).await?;
  let conn    = open_existing(db_path).await?;
  let applied = applied_checksums(&conn).await?;
  Ok(pending_of(scripts, &applied)?.into_iter().map(|s| s.id).collect())
}

/// Apply every pending migration in id order, each in its own transaction,
/// and return the ids applied. Stops at the first failing script; earlier
/// scripts stay applied. A missing database is
/// [`MissingDatabase`](Error::MissingDatabase), never a fresh empty file.
pub async fn apply_pending(db_path: &Path, dir: &Path) -> Result<Vec<String>> {
  let scripts = load_scripts(dir).await?;
  let conn    = open_existing(db_path).await?;
  let applied = applied_checksums(&conn).await?;

  let mut done = Vec::new();
  for script in pending_of(scripts, &applied)? {
    let id         = script.id.clone();
    let applied_at = encode_dt(Utc::now());
    conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(&script.sql)?;
        tx.execute(
          "INSERT INTO _quill_migrations (id, checksum, applied_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![script.id, script.checksum, applied_at],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    info!(migration = %id, "migration applied");
    done.push(id);
  }
  Ok(done)
}

/// Path of the script for migration `id` under `dir`.
pub fn script_path(dir: &Path, id: &str) -> PathBuf { dir.join(id).join(SCRIPT_NAME) }
