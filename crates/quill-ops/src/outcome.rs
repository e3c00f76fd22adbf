//! Explicit representation of steps whose failure is tolerated.

use std::fmt::Display;

use tracing::warn;

/// The result of a best-effort step: either it completed, or it failed and
/// the failure was logged and deliberately ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort<T> {
  Completed(T),
  Swallowed {
    /// Short name of the step, e.g. `"wal checkpoint"`.
    step:   &'static str,
    reason: String,
  },
}

impl<T> BestEffort<T> {
  /// Convert a fallible result, logging the failure if there is one.
  pub fn from_result<E: Display>(step: &'static str, result: Result<T, E>) -> Self {
    match result {
      Ok(value) => Self::Completed(value),
      Err(e) => {
        warn!(step, error = %e, "best-effort step failed; continuing");
        Self::Swallowed { step, reason: e.to_string() }
      }
    }
  }

  pub fn is_completed(&self) -> bool { matches!(self, Self::Completed(_)) }

  pub fn completed(self) -> Option<T> {
    match self {
      Self::Completed(value) => Some(value),
      Self::Swallowed { .. } => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keeps_the_reason_of_a_swallowed_failure() {
    let outcome: BestEffort<()> = BestEffort::from_result("diff", Err("tool missing"));
    assert_eq!(outcome, BestEffort::Swallowed { step: "diff", reason: "tool missing".into() });
    assert!(!outcome.is_completed());

    let ok = BestEffort::from_result::<&str>("diff", Ok(3));
    assert_eq!(ok.completed(), Some(3));
  }
}
