//! Statistics service: word-count batch, daily rollups and the integrity
//! audit.
//!
//! Event timestamps are stored in UTC; calendar days are taken in the
//! service's time zone (`Local` in production, `Utc` in tests).

use std::{
  collections::{BTreeMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use quill_core::{
  report::{IntegrityReport, RecalcKind, RecalcSummary, WordCountFailure, WordCountReport},
  stat::{DailyStat, format_date},
  store::StatsStore,
  words::count_words,
};
use tracing::{debug, error, info};

use crate::{Error, Result};

/// More than this many zero-count posts with real content is reported.
const ZERO_WORD_COUNT_THRESHOLD: usize = 5;

pub struct StatsService<S, Z: TimeZone = Local> {
  store: Arc<S>,
  zone:  Z,
}

impl<S: StatsStore> StatsService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, zone: Local } }
}

impl<S: StatsStore, Z: TimeZone> StatsService<S, Z> {
  pub fn with_zone(store: Arc<S>, zone: Z) -> Self { Self { store, zone } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// The current calendar date in the service's time zone.
  pub fn today(&self) -> NaiveDate { Utc::now().with_timezone(&self.zone).date_naive() }

  fn local_date(&self, t: DateTime<Utc>) -> NaiveDate { t.with_timezone(&self.zone).date_naive() }

  /// The instant `date` begins in the service's time zone.
  ///
  /// When midnight does not exist (a DST gap) the day starts an hour later.
  pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    self
      .zone
      .from_local_datetime(&midnight)
      .earliest()
      .or_else(|| self.zone.from_local_datetime(&(midnight + TimeDelta::hours(1))).earliest())
      .map(|t| t.with_timezone(&Utc))
      .unwrap_or_else(|| midnight.and_utc())
  }

  // ─── Word counts ─────────────────────────────────────────────────────────

  /// Recount every post and write the counts back one post at a time.
  ///
  /// A failed write is logged and collected; the batch carries on.
  pub async fn recalculate_post_word_counts(&self) -> Result<WordCountReport> {
    let posts = self.store.post_bodies().await.map_err(Error::store)?;

    let mut report = WordCountReport::default();
    for post in posts {
      let count = count_words(&post.content);
      match self.store.set_word_count(post.id, count).await {
        Ok(()) => report.updated.push(post.id),
        Err(e) => {
          error!(post_id = post.id, error = %e, "failed to update word count");
          report.failed.push(WordCountFailure { post_id: post.id, error: e.to_string() });
        }
      }
    }

    info!(
      updated = report.updated.len(),
      failed = report.failed.len(),
      "word counts recalculated"
    );
    Ok(report)
  }

  // ─── Daily rollups ───────────────────────────────────────────────────────

  /// Rebuild the rollups for today and the `days` days before it.
  pub async fn aggregate_daily_stats(&self, days: u32) -> Result<u32> {
    self.aggregate_daily_stats_until(self.today(), days).await
  }

  /// Rebuild the rollups for `today` and the `days` days before it, oldest
  /// first, and return how many days were written.
  pub async fn aggregate_daily_stats_until(&self, today: NaiveDate, days: u32) -> Result<u32> {
    let first = today
      .checked_sub_days(Days::new(u64::from(days)))
      .ok_or(Error::LookbackOutOfRange(days))?;
    let next  = today
      .checked_add_days(Days::new(1))
      .ok_or(Error::DateOutOfRange(today))?;
    let from  = self.day_start(first);
    let until = self.day_start(next);

    let visits   = self.store.visits_between(from, until).await.map_err(Error::store)?;
    let posts    = self.store.published_post_times_between(from, until).await.map_err(Error::store)?;
    let comments = self.store.comment_times_between(from, until).await.map_err(Error::store)?;

    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for visit in &visits {
      let bucket = buckets.entry(self.local_date(visit.created_at)).or_default();
      bucket.pv += 1;
      if let Some(client) = visit.client_id() {
        bucket.clients.insert(client.to_owned());
      }
    }
    for t in posts {
      buckets.entry(self.local_date(t)).or_default().posts += 1;
    }
    for t in comments {
      buckets.entry(self.local_date(t)).or_default().comments += 1;
    }

    let mut written = 0;
    for date in first.iter_days().take_while(|d| *d <= today) {
      let bucket = buckets.remove(&date).unwrap_or_default();
      let stat = DailyStat {
        date,
        pv:         bucket.pv,
        uv:         bucket.clients.len() as u64,
        posts:      bucket.posts,
        comments:   bucket.comments,
        updated_at: Utc::now(),
      };
      debug!(date = %stat.key(), pv = stat.pv, uv = stat.uv, "upserting daily stat");
      self.store.upsert_daily_stat(stat).await.map_err(Error::store)?;
      written += 1;
    }

    info!(days = written, from = %format_date(first), to = %format_date(today), "daily stats aggregated");
    Ok(written)
  }

  /// Stored rollups for `from..=to`, oldest first.
  pub async fn daily_stats(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStat>> {
    self.store.daily_stats(from, to).await.map_err(Error::store)
  }

  // ─── Integrity ───────────────────────────────────────────────────────────

  pub async fn verify_data_integrity(&self) -> Result<IntegrityReport> {
    self.verify_data_integrity_on(self.today()).await
  }

  /// Audit yesterday's rollup against a fresh recount and look for posts
  /// that were never word-counted. Writes nothing.
  pub async fn verify_data_integrity_on(&self, today: NaiveDate) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();

    if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
      let recount = self
        .store
        .count_visits_between(self.day_start(yesterday), self.day_start(today))
        .await
        .map_err(Error::store)?;
      let stored = self.store.daily_stat(yesterday).await.map_err(Error::store)?;

      match stored {
        Some(row) if row.pv != recount => report.mismatch(format!(
          "page views for {} differ: stored {}, recounted {}",
          row.key(),
          row.pv,
          recount
        )),
        _ => {}
      }
    }

    let uncounted = self
      .store
      .zero_word_count_posts()
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|p| p.content.chars().any(char::is_whitespace))
      .count();
    if uncounted > ZERO_WORD_COUNT_THRESHOLD {
      report.note(format!("{uncounted} posts have content but a word count of 0"));
    }

    if report.valid {
      info!(issues = report.issues.len(), "integrity check passed");
    } else {
      error!(issues = ?report.issues, "integrity check failed");
    }
    Ok(report)
  }

  // ─── Trigger ─────────────────────────────────────────────────────────────

  /// Run the parts of the recalculation `kind` selects.
  pub async fn recalculate(&self, kind: RecalcKind, days: u32) -> Result<RecalcSummary> {
    self.recalculate_until(kind, self.today(), days).await
  }

  /// [`recalculate`](Self::recalculate) with the rollup window ending on
  /// `today`.
  pub async fn recalculate_until(
    &self,
    kind: RecalcKind,
    today: NaiveDate,
    days: u32,
  ) -> Result<RecalcSummary> {
    let mut summary = RecalcSummary { kind, ..RecalcSummary::default() };
    if kind.includes_words() {
      summary.words = Some(self.recalculate_post_word_counts().await?);
    }
    if kind.includes_daily() {
      summary.days_processed = Some(self.aggregate_daily_stats_until(today, days).await?);
    }
    Ok(summary)
  }
}

#[derive(Default)]
struct DayBucket {
  pv:       u64,
  clients:  HashSet<String>,
  posts:    u64,
  comments: u64,
}
