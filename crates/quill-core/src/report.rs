//! Result types returned by the maintenance batches.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

// ─── Integrity ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  /// A confirmed mismatch against a fresh recount.
  Error,
  /// Worth a look, but not proof of corruption.
  Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
  pub severity: Severity,
  pub message:  String,
}

/// Outcome of an integrity audit. Never self-heals; a human or a separate
/// repair run acts on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
  pub valid:  bool,
  pub issues: Vec<IntegrityIssue>,
}

impl Default for IntegrityReport {
  fn default() -> Self { Self { valid: true, issues: Vec::new() } }
}

impl IntegrityReport {
  /// Record a confirmed mismatch; flips `valid`.
  pub fn mismatch(&mut self, message: String) {
    self.valid = false;
    self.issues.push(IntegrityIssue { severity: Severity::Error, message });
  }

  /// Record an informational finding; `valid` is untouched.
  pub fn note(&mut self, message: String) {
    self.issues.push(IntegrityIssue { severity: Severity::Info, message });
  }
}

// ─── Word counts ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountFailure {
  pub post_id: i64,
  pub error:   String,
}

/// Which posts a word-count batch managed to write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCountReport {
  pub updated: Vec<i64>,
  pub failed:  Vec<WordCountFailure>,
}

// ─── Recalculation selector ──────────────────────────────────────────────────

/// The `type` selector of the recalculation trigger.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecalcKind {
  Words,
  Daily,
  #[default]
  All,
}

impl RecalcKind {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s.trim()).map_err(|_| Error::UnknownRecalcKind(s.to_owned()))
  }

  pub fn includes_words(self) -> bool { matches!(self, Self::Words | Self::All) }

  pub fn includes_daily(self) -> bool { matches!(self, Self::Daily | Self::All) }
}

/// What a recalculation run touched. Fields are `None` for parts the
/// selector skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcSummary {
  pub kind:           RecalcKind,
  pub words:          Option<WordCountReport>,
  pub days_processed: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recalc_kind_parses_selector() {
    assert_eq!(RecalcKind::parse("words").unwrap(), RecalcKind::Words);
    assert_eq!(RecalcKind::parse(" daily ").unwrap(), RecalcKind::Daily);
    assert_eq!(RecalcKind::parse("all").unwrap(), RecalcKind::All);
    assert!(matches!(RecalcKind::parse("weekly"), Err(Error::UnknownRecalcKind(_))));
    assert_eq!(RecalcKind::Words.to_string(), "words");
  }

  #[test]
  fn note_keeps_report_valid() {
    let mut report = IntegrityReport::default();
    report.note("7 posts have no word count".into());
    assert!(report.valid);

    report.mismatch("pv differs".into());
    assert!(!report.valid);
    assert_eq!(report.issues.len(), 2);
    assert_eq!(report.issues[1].severity, Severity::Error);
  }
}
