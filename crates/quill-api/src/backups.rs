//! Handlers for `/backups` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/backups` | Newest first |
//! | `POST` | `/backups` | Take a backup now |
//! | `POST` | `/backups/cleanup` | Apply retention |
//! | `POST` | `/backups/restore` | Body: `{"filename":"dev-20240101040000.db"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use quill_core::{maintenance::BackupArtifact, store::StatsStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /backups`
pub async fn list<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<BackupArtifact>>, ApiError>
where
  S: StatsStore + 'static,
{
  Ok(Json(state.backups.list_backups().await?))
}

/// `POST /backups`
pub async fn create<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: StatsStore + 'static,
{
  let filename = state.backups.backup_once().await?;
  Ok((StatusCode::CREATED, Json(json!({ "filename": filename }))))
}

/// `POST /backups/cleanup`
pub async fn cleanup<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, ApiError>
where
  S: StatsStore + 'static,
{
  let deleted = state.backups.cleanup_backups().await?;
  Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
  pub filename: String,
}

/// `POST /backups/restore`
pub async fn restore<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<RestoreBody>,
) -> Result<Json<Value>, ApiError>
where
  S: StatsStore + 'static,
{
  state.backups.restore_backup(&body.filename).await?;
  info!(filename = %body.filename, "restore requested over http completed");
  Ok(Json(json!({ "restored": body.filename })))
}
