//! Daily rollup rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Date format used for rollup keys and on the command line.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One pre-aggregated summary row per calendar date.
///
/// A row is always replaced as a whole; nothing is ever incremented in place,
/// so re-running an aggregation over the same window is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
  /// Local calendar date; unique.
  pub date:       NaiveDate,
  /// Page views.
  pub pv:         u64,
  /// Distinct non-empty client identifiers seen that day.
  pub uv:         u64,
  /// Published posts created that day.
  pub posts:      u64,
  pub comments:   u64,
  pub updated_at: DateTime<Utc>,
}

impl DailyStat {
  /// The `YYYY-MM-DD` key this row is stored under.
  pub fn key(&self) -> String { format_date(self.date) }

  /// True when both rows carry the same counts, ignoring `updated_at`.
  pub fn same_counts(&self, other: &DailyStat) -> bool {
    self.date == other.date
      && self.pv == other.pv
      && self.uv == other.uv
      && self.posts == other.posts
      && self.comments == other.comments
  }
}

pub fn format_date(date: NaiveDate) -> String { date.format(DATE_FORMAT).to_string() }

pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate(s.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_and_formats_keys() {
    let d = parse_date("2024-01-01").unwrap();
    assert_eq!(format_date(d), "2024-01-01");
    assert!(matches!(parse_date("01/01/2024"), Err(Error::InvalidDate(_))));
  }

  #[test]
  fn serialises_date_as_plain_string() {
    let stat = DailyStat {
      date:       parse_date("2024-03-09").unwrap(),
      pv:         3,
      uv:         2,
      posts:      1,
      comments:   0,
      updated_at: Utc::now(),
    };
    let json = serde_json::to_value(&stat).unwrap();
    assert_eq!(json["date"], "2024-03-09");
    assert_eq!(stat.key(), "2024-03-09");
  }
}
