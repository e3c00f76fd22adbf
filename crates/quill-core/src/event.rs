//! Raw event records owned by the surrounding blog application.
//!
//! Quill only reads these. The one exception is a post's `word_count`
//! column, which is written back by the word-count batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Visits ──────────────────────────────────────────────────────────────────

/// One page view. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
  pub id:         i64,
  /// Client identifier, usually the remote IP. May be missing or blank.
  pub ip:         Option<String>,
  pub path:       String,
  pub created_at: DateTime<Utc>,
}

impl Visit {
  /// The identifier used for unique-visitor counting, if there is one.
  pub fn client_id(&self) -> Option<&str> {
    self.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty())
  }
}

/// Input for recording a visit. Used by the host application and by tests.
#[derive(Debug, Clone)]
pub struct NewVisit {
  pub ip:         Option<String>,
  pub path:       String,
  pub created_at: DateTime<Utc>,
}

impl NewVisit {
  pub fn new(ip: impl Into<String>, path: impl Into<String>, created_at: DateTime<Utc>) -> Self {
    Self { ip: Some(ip.into()), path: path.into(), created_at }
  }
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// The slice of a post the word-count normaliser works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBody {
  pub id:      i64,
  pub content: String,
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
  pub title:      String,
  pub content:    String,
  pub published:  bool,
  pub created_at: DateTime<Utc>,
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// Input for creating a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
  pub post_id:    Option<i64>,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn visit(ip: Option<&str>) -> Visit {
    Visit {
      id:         1,
      ip:         ip.map(str::to_owned),
      path:       "/".into(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn client_id_ignores_blank_addresses() {
    assert_eq!(visit(Some("1.2.3.4")).client_id(), Some("1.2.3.4"));
    assert_eq!(visit(Some("  ")).client_id(), None);
    assert_eq!(visit(Some("")).client_id(), None);
    assert_eq!(visit(None).client_id(), None);
  }
}
