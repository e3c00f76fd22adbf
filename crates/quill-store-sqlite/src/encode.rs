//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision and a `Z` suffix, so string order equals time order and range
//! queries can compare columns directly. Dates are `YYYY-MM-DD`. Counters are
//! stored as `INTEGER` and must fit in an `i64`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use quill_core::{
  event::{PostBody, Visit},
  stat::{DailyStat, format_date, parse_date},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Millis, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { format_date(d) }

pub fn decode_date(s: &str) -> Result<NaiveDate> { Ok(parse_date(s)?) }

// ─── Counters ────────────────────────────────────────────────────────────────

pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn decode_count(column: &'static str, value: i64) -> Result<u64> {
  u64::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `visits` row.
pub struct RawVisit {
  pub id:         i64,
  pub ip:         Option<String>,
  pub path:       String,
  pub created_at: String,
}

impl RawVisit {
  pub fn into_visit(self) -> Result<Visit> {
    Ok(Visit {
      id:         self.id,
      ip:         self.ip,
      path:       self.path,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `daily_stats` row.
pub struct RawDailyStat {
  pub date:       String,
  pub pv:         i64,
  pub uv:         i64,
  pub posts:      i64,
  pub comments:   i64,
  pub updated_at: String,
}

impl RawDailyStat {
  pub fn into_stat(self) -> Result<DailyStat> {
    Ok(DailyStat {
      date:       decode_date(&self.date)?,
      pv:         decode_count("pv", self.pv)?,
      uv:         decode_count("uv", self.uv)?,
      posts:      decode_count("posts", self.posts)?,
      comments:   decode_count("comments", self.comments)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `posts` row for word counting.
pub struct RawPostBody {
  pub id:      i64,
  pub content: Option<String>,
}

impl RawPostBody {
  pub fn into_body(self) -> PostBody {
    PostBody { id: self.id, content: self.content.unwrap_or_default() }
  }
}
