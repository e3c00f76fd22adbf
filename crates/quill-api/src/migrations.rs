//! Handlers for `/migrations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/migrations` | History, newest first |
//! | `POST` | `/migrations` | Body: `{"name":"add_tags"}` (name optional) |
//! | `POST` | `/migrations/deploy` | Apply pending migrations |

use axum::{Json, extract::State};
use quill_core::{
  maintenance::{MigrateOutcome, MigrationRecord},
  store::StatsStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /migrations`
pub async fn history<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<MigrationRecord>>, ApiError>
where
  S: StatsStore + 'static,
{
  Ok(Json(state.migrations.migration_history().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrateBody {
  pub name: Option<String>,
}

/// `POST /migrations`
pub async fn migrate<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<MigrateBody>,
) -> Result<Json<MigrateOutcome>, ApiError>
where
  S: StatsStore + 'static,
{
  Ok(Json(state.migrations.safe_migrate(body.name.as_deref()).await?))
}

/// `POST /migrations/deploy`
pub async fn deploy<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, ApiError>
where
  S: StatsStore + 'static,
{
  let applied = state.migrations.apply_migration().await?;
  Ok(Json(json!({ "applied": applied })))
}
