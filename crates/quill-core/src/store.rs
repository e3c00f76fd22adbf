//! The `StatsStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `quill-store-sqlite`).
//! The maintenance services in `quill-ops` depend on this abstraction, not on
//! any concrete backend, and receive the store at construction time.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  event::{PostBody, Visit},
  stat::DailyStat,
};

/// Read access to the raw event logs plus ownership of the rollup table and
/// the `word_count` column.
///
/// Every time window is half-open: `from <= t < until`.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait StatsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Raw events (read-only) ────────────────────────────────────────────

  /// All visits in the window, oldest first.
  fn visits_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Visit>, Self::Error>> + Send + '_;

  /// Number of visits in the window, counted by the backend.
  fn count_visits_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Creation times of published posts in the window.
  fn published_post_times_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<DateTime<Utc>>, Self::Error>> + Send + '_;

  /// Creation times of comments in the window.
  fn comment_times_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<DateTime<Utc>>, Self::Error>> + Send + '_;

  // ── Rollups ───────────────────────────────────────────────────────────

  /// Insert or fully replace the row for `stat.date`.
  fn upsert_daily_stat(
    &self,
    stat: DailyStat,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn daily_stat(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<DailyStat>, Self::Error>> + Send + '_;

  /// Rows with `from <= date <= to`, oldest first.
  fn daily_stats(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DailyStat>, Self::Error>> + Send + '_;

  // ── Word counts ───────────────────────────────────────────────────────

  /// Every post regardless of published state.
  fn post_bodies(&self) -> impl Future<Output = Result<Vec<PostBody>, Self::Error>> + Send + '_;

  fn set_word_count(
    &self,
    post_id: i64,
    count: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Posts whose stored word count is exactly zero.
  fn zero_word_count_posts(
    &self,
  ) -> impl Future<Output = Result<Vec<PostBody>, Self::Error>> + Send + '_;
}
