//! Handlers for `/stats` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/stats/verify` | Integrity report |
//! | `POST` | `/stats/recalculate` | Body: `{"type":"words\|daily\|all","days":30}` |
//! | `GET`  | `/stats/daily` | `?from=YYYY-MM-DD&to=YYYY-MM-DD` |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::Days;
use quill_core::{
  report::{IntegrityReport, RecalcKind, RecalcSummary},
  stat::{DailyStat, parse_date},
  store::StatsStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Verify ───────────────────────────────────────────────────────────────────

/// `GET /stats/verify`
pub async fn verify<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
) -> Result<Json<IntegrityReport>, ApiError>
where
  S: StatsStore + 'static,
{
  Ok(Json(state.stats.verify_data_integrity().await?))
}

// ─── Recalculate ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RecalcBody {
  /// `words`, `daily` or `all`; defaults to `all`.
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub days: Option<u32>,
}

/// `POST /stats/recalculate`
pub async fn recalculate<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Json(body): Json<RecalcBody>,
) -> Result<Json<RecalcSummary>, ApiError>
where
  S: StatsStore + 'static,
{
  let kind = match body.kind.as_deref() {
    Some(s) => RecalcKind::parse(s)?,
    None => RecalcKind::default(),
  };
  let days = body.days.unwrap_or(state.lookback_days);
  Ok(Json(state.stats.recalculate(kind, days).await?))
}

// ─── Daily rollups ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DailyParams {
  pub from: Option<String>,
  pub to:   Option<String>,
}

/// `GET /stats/daily[?from=&to=]`: both bounds inclusive; `to` defaults to
/// today and `from` to 30 days before `to`.
pub async fn daily<S>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Query(params): Query<DailyParams>,
) -> Result<Json<Vec<DailyStat>>, ApiError>
where
  S: StatsStore + 'static,
{
  let to = match params.to.as_deref() {
    Some(s) => parse_date(s)?,
    None => state.stats.today(),
  };
  let from = match params.from.as_deref() {
    Some(s) => parse_date(s)?,
    None => to.checked_sub_days(Days::new(30)).unwrap_or(to),
  };
  if from > to {
    return Err(ApiError::BadRequest(format!("from {from} is after to {to}")));
  }
  Ok(Json(state.stats.daily_stats(from, to).await?))
}
