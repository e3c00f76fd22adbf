//! Whole-file operations on a live SQLite database.
//!
//! Each function opens its own short-lived connection to the file so it can
//! run alongside the application's [`SqliteStore`](crate::SqliteStore).
//! None of them create the live database: a missing file is an error.

use std::path::{Path, PathBuf};

use rusqlite::{DatabaseName, OpenFlags, backup::Progress};
use tracing::debug;

use crate::{Error, Result};

/// Open an existing database file read-write without creating it.
pub(crate) async fn open_existing(path: &Path) -> Result<tokio_rusqlite::Connection> {
  if !tokio::fs::try_exists(path).await.map_err(|e| Error::io(path, e))? {
    return Err(Error::MissingDatabase(path.to_path_buf()));
  }
  let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
    | OpenFlags::SQLITE_OPEN_URI
    | OpenFlags::SQLITE_OPEN_NO_MUTEX;
  Ok(tokio_rusqlite::Connection::open_with_flags(path, flags).await?)
}

/// Fold the write-ahead log back into the main file and truncate it.
pub async fn checkpoint(path: &Path) -> Result<()> {
  let conn = open_existing(path).await?;
  conn
    .call(|conn| {
      conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
      Ok(())
    })
    .await?;
  debug!(path = %path.display(), "wal checkpoint complete");
  Ok(())
}

/// Write a compacted, transactionally consistent copy of `live` to `target`.
///
/// SQLite refuses to overwrite a non-empty target, so an existing file is an
/// error rather than a silent replace.
pub async fn vacuum_into(live: &Path, target: &Path) -> Result<()> {
  let conn       = open_existing(live).await?;
  let target_str = target.to_string_lossy().into_owned();
  conn
    .call(move |conn| {
      conn.execute("VACUUM INTO ?1", rusqlite::params![target_str])?;
      Ok(())
    })
    .await?;
  Ok(())
}

/// Replace the contents of `live` with those of `backup` through SQLite's
/// online backup API.
///
/// The copy runs under the destination's write lock; if another connection
/// keeps the database busy the restore gives up with `SQLITE_BUSY` instead of
/// interleaving with its writes.
pub async fn restore_from(live: &Path, backup: &Path) -> Result<()> {
  if !tokio::fs::try_exists(backup).await.map_err(|e| Error::io(backup, e))? {
    return Err(Error::MissingDatabase(backup.to_path_buf()));
  }
  let conn   = open_existing(live).await?;
  let source = PathBuf::from(backup);
  conn
    .call(move |conn| {
      conn.restore(DatabaseName::Main, &source, None::<fn(Progress)>)?;
      Ok(())
    })
    .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn seeded_db(dir: &Path) -> PathBuf {
    let path = dir.join("live.db");
    let conn = tokio_rusqlite::Connection::open(&path).await.unwrap();
    conn
      .call(|conn| {
        conn.execute_batch(
          "PRAGMA journal_mode = WAL;
           CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);
           INSERT INTO notes (body) VALUES ('first'), ('second');",
        )?;
        Ok(())
      })
      .await
      .unwrap();
    path
  }

  async fn note_count(path: &Path) -> i64 {
    let conn = tokio_rusqlite::Connection::open(path).await.unwrap();
    conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM notes", [], |r| r.get(0))?))
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn missing_database_is_not_created() {
    let dir     = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.db");
    assert!(matches!(checkpoint(&missing).await, Err(Error::MissingDatabase(_))));
    assert!(!missing.exists());
  }

  #[tokio::test]
  async fn vacuum_into_produces_a_readable_copy() {
    let dir  = tempfile::tempdir().unwrap();
    let live = seeded_db(dir.path()).await;
    checkpoint(&live).await.unwrap();

    let copy = dir.path().join("copy.db");
    vacuum_into(&live, &copy).await.unwrap();
    assert_eq!(note_count(&copy).await, 2);

    // A second snapshot onto the same name must not clobber it.
    assert!(vacuum_into(&live, &copy).await.is_err());
  }

  #[tokio::test]
  async fn restore_replaces_live_contents() {
    let dir  = tempfile::tempdir().unwrap();
    let live = seeded_db(dir.path()).await;
    let copy = dir.path().join("copy.db");
    vacuum_into(&live, &copy).await.unwrap();

    let conn = tokio_rusqlite::Connection::open(&live).await.unwrap();
    conn
      .call(|conn| {
        conn.execute("INSERT INTO notes (body) VALUES ('third')", [])?;
        Ok(())
      })
      .await
      .unwrap();
    drop(conn);
    assert_eq!(note_count(&live).await, 3);

    restore_from(&live, &copy).await.unwrap();
    assert_eq!(note_count(&live).await, 2);
  }
}
