//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an admin handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error(transparent)]
  Ops(quill_ops::Error),
}

impl From<quill_ops::Error> for ApiError {
  fn from(e: quill_ops::Error) -> Self {
    use quill_ops::Error as E;
    match e {
      E::InvalidBackupName(_)
      | E::UnsupportedBackupFormat(_)
      | E::InvalidMigrationName(_)
      | E::InvalidSchedule(_)
      | E::LookbackOutOfRange(_)
      | E::DateOutOfRange(_) => ApiError::BadRequest(e.to_string()),
      E::BackupNotFound(_) => ApiError::NotFound(e.to_string()),
      E::BackupExists(_) => ApiError::Conflict(e.to_string()),
      other => ApiError::Ops(other),
    }
  }
}

impl From<quill_core::Error> for ApiError {
  fn from(e: quill_core::Error) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Ops(e) => {
        tracing::error!(error = %e, "admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"quill\""),
      );
    }
    res
  }
}
