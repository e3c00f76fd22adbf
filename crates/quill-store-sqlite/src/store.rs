//! [`SqliteStore`]: the SQLite implementation of [`StatsStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use quill_core::{
  event::{NewComment, NewPost, NewVisit, PostBody, Visit},
  stat::DailyStat,
  store::StatsStore,
};

use crate::{
  Error, Result,
  encode::{
    RawDailyStat, RawPostBody, RawVisit, decode_count, decode_dt, encode_count, encode_date,
    encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The blog database backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch the `created_at` column of `table` for rows in a window.
  ///
  /// `table_filter` is a static SQL fragment ANDed into the WHERE clause.
  async fn times_between(
    &self,
    table: &'static str,
    table_filter: &'static str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<DateTime<Utc>>> {
    let from_str  = encode_dt(from);
    let until_str = encode_dt(until);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT created_at FROM {table}
           WHERE created_at >= ?1 AND created_at < ?2 {table_filter}
           ORDER BY created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|s| decode_dt(s)).collect()
  }

  // ── Host-application writes ───────────────────────────────────────────────
  //
  // The blog application owns these tables. The methods exist so that the
  // pipeline can be exercised end to end without it.

  /// Append a visit and return its row id.
  pub async fn record_visit(&self, visit: NewVisit) -> Result<i64> {
    let at_str = encode_dt(visit.created_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO visits (ip, path, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![visit.ip, visit.path, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  /// Insert a post with a zero word count and return its id.
  pub async fn add_post(&self, post: NewPost) -> Result<i64> {
    let at_str = encode_dt(post.created_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (title, content, published, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![post.title, post.content, post.published, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  /// Replace a post's body without touching its word count, the way an
  /// editor save does.
  pub async fn update_post_content(&self, post_id: i64, content: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE posts SET content = ?1 WHERE id = ?2",
          rusqlite::params![content, post_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn word_count(&self, post_id: i64) -> Result<Option<u64>> {
    let raw: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT word_count FROM posts WHERE id = ?1",
              rusqlite::params![post_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(|n| decode_count("word_count", n)).transpose()
  }

  /// Insert a comment and return its id.
  pub async fn add_comment(&self, comment: NewComment) -> Result<i64> {
    let at_str = encode_dt(comment.created_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO comments (post_id, content, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![comment.post_id, comment.content, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }
}

// ─── StatsStore impl ─────────────────────────────────────────────────────────

impl StatsStore for SqliteStore {
  type Error = Error;

  // ── Raw events ────────────────────────────────────────────────────────────

  async fn visits_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Visit>> {
    let from_str  = encode_dt(from);
    let until_str = encode_dt(until);

    let raws: Vec<RawVisit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, ip, path, created_at FROM visits
           WHERE created_at >= ?1 AND created_at < ?2
           ORDER BY created_at, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, until_str], |row| {
            Ok(RawVisit {
              id:         row.get(0)?,
              ip:         row.get(1)?,
              path:       row.get(2)?,
              created_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisit::into_visit).collect()
  }

  async fn count_visits_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<u64> {
    let from_str  = encode_dt(from);
    let until_str = encode_dt(until);

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM visits WHERE created_at >= ?1 AND created_at < ?2",
          rusqlite::params![from_str, until_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    decode_count("visits", n)
  }

  async fn published_post_times_between(
    &self,
    from:  DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<DateTime<Utc>>> {
    self.times_between("posts", "AND published = 1", from, until).await
  }

  async fn comment_times_between(
    &self,
    from:  DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<DateTime<Utc>>> {
    self.times_between("comments", "", from, until).await
  }

  // ── Rollups ───────────────────────────────────────────────────────────────

  async fn upsert_daily_stat(&self, stat: DailyStat) -> Result<()> {
    let date_str = encode_date(stat.date);
    let at_str   = encode_dt(stat.updated_at);
    let pv       = encode_count(stat.pv);
    let uv       = encode_count(stat.uv);
    let posts    = encode_count(stat.posts);
    let comments = encode_count(stat.comments);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO daily_stats (date, pv, uv, posts, comments, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(date) DO UPDATE SET
             pv         = excluded.pv,
             uv         = excluded.uv,
             posts      = excluded.posts,
             comments   = excluded.comments,
             updated_at = excluded.updated_at",
          rusqlite::params![date_str, pv, uv, posts, comments, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn daily_stat(&self, date: NaiveDate) -> Result<Option<DailyStat>> {
    let date_str = encode_date(date);

    let raw: Option<RawDailyStat> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT date, pv, uv, posts, comments, updated_at
               FROM daily_stats WHERE date = ?1",
              rusqlite::params![date_str],
              |row| {
                Ok(RawDailyStat {
                  date:       row.get(0)?,
                  pv:         row.get(1)?,
                  uv:         row.get(2)?,
                  posts:      row.get(3)?,
                  comments:   row.get(4)?,
                  updated_at: row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDailyStat::into_stat).transpose()
  }

  async fn daily_stats(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStat>> {
    let from_str = encode_date(from);
    let to_str   = encode_date(to);

    let raws: Vec<RawDailyStat> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT date, pv, uv, posts, comments, updated_at
           FROM daily_stats
           WHERE date >= ?1 AND date <= ?2
           ORDER BY date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, to_str], |row| {
            Ok(RawDailyStat {
              date:       row.get(0)?,
              pv:         row.get(1)?,
              uv:         row.get(2)?,
              posts:      row.get(3)?,
              comments:   row.get(4)?,
              updated_at: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDailyStat::into_stat).collect()
  }

  // ── Word counts ───────────────────────────────────────────────────────────

  async fn post_bodies(&self) -> Result<Vec<PostBody>> {
    let raws: Vec<RawPostBody> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT id, content FROM posts ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| Ok(RawPostBody { id: row.get(0)?, content: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawPostBody::into_body).collect())
  }

  async fn set_word_count(&self, post_id: i64, count: u64) -> Result<()> {
    let count = encode_count(count);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE posts SET word_count = ?1 WHERE id = ?2",
          rusqlite::params![count, post_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn zero_word_count_posts(&self) -> Result<Vec<PostBody>> {
    let raws: Vec<RawPostBody> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, content FROM posts WHERE word_count = 0 ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| Ok(RawPostBody { id: row.get(0)?, content: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawPostBody::into_body).collect())
  }
}
