//! Error types for `quill-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown recalculation type: {0:?} (expected words, daily or all)")]
  UnknownRecalcKind(String),

  #[error("invalid date {0:?}: expected YYYY-MM-DD")]
  InvalidDate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
