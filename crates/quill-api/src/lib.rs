//! Admin JSON API for Quill.
//!
//! Exposes an axum [`Router`] over the maintenance services: statistics
//! recalculation and audit, backups, and guarded migrations. Every route
//! requires HTTP Basic auth. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/admin", quill_api::admin_router(state))
//! ```

pub mod auth;
pub mod backups;
pub mod error;
pub mod migrations;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use quill_core::store::StatsStore;
use quill_ops::{backup::BackupEngine, migrate::MigrationOrchestrator, stats::StatsService};
use tower_http::trace::TraceLayer;

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all admin handlers.
pub struct AppState<S: StatsStore> {
  pub stats:         Arc<StatsService<S>>,
  pub backups:       Arc<BackupEngine>,
  pub migrations:    Arc<MigrationOrchestrator>,
  pub auth:          Arc<AuthConfig>,
  /// Days recalculated when a request does not say.
  pub lookback_days: u32,
}

impl<S: StatsStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      stats:         self.stats.clone(),
      backups:       self.backups.clone(),
      migrations:    self.migrations.clone(),
      auth:          self.auth.clone(),
      lookback_days: self.lookback_days,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the admin router for `state`.
pub fn admin_router<S>(state: AppState<S>) -> Router
where
  S: StatsStore + 'static,
{
  Router::new()
    // Statistics
    .route("/stats/verify", get(stats::verify::<S>))
    .route("/stats/recalculate", post(stats::recalculate::<S>))
    .route("/stats/daily", get(stats::daily::<S>))
    // Backups
    .route("/backups", get(backups::list::<S>).post(backups::create::<S>))
    .route("/backups/cleanup", post(backups::cleanup::<S>))
    .route("/backups/restore", post(backups::restore::<S>))
    // Migrations
    .route("/migrations", get(migrations::history::<S>).post(migrations::migrate::<S>))
    .route("/migrations/deploy", post(migrations::deploy::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::Utc;
  use quill_core::event::{NewPost, NewVisit};
  use quill_ops::{history::MigrationHistory, migrate::SqlMigrator};
  use quill_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::Value;
  use tempfile::TempDir;
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> (AppState<SqliteStore>, TempDir) {
    let tmp   = tempfile::tempdir().unwrap();
    let db    = tmp.path().join("dev.db");
    let store = Arc::new(SqliteStore::open(&db).await.unwrap());
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let backups = Arc::new(BackupEngine::with_paths(&db, tmp.path().join("backups"), 7));
    let state   = AppState {
      stats: Arc::new(StatsService::new(store)),
      migrations: Arc::new(MigrationOrchestrator::new(
        backups.clone(),
        SqlMigrator::new(&db, tmp.path().join("migrations")),
        MigrationHistory::new(tmp.path().join("backups").join("migrations")),
      )),
      backups,
      auth: Arc::new(AuthConfig { username: "admin".to_string(), password_hash: hash }),
      lookback_days: 7,
    };
    (state, tmp)
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    state:  AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   Option<&str>,
  ) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp    = admin_router(state).oneshot(req).await.unwrap();
    let status  = resp.status();
    let headers = resp.headers().clone();
    let bytes   = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json    = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, headers, json)
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_credentials_get_401_with_challenge() {
    let (state, _tmp) = make_state("secret").await;
    let (status, headers, body) = send(state, "GET", "/backups", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(body["error"], "unauthorized");
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "nope");
    let (status, _, _) = send(state, "POST", "/backups", Some(&auth), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── Backups ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_list_backups() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let (status, _, created) = send(state.clone(), "POST", "/backups", Some(&auth), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let filename = created["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("dev-"));

    let (status, _, listed) = send(state.clone(), "GET", "/backups", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["filename"], filename.as_str());

    let body = format!(r#"{{"filename":"{filename}"}}"#);
    let (status, _, restored) =
      send(state.clone(), "POST", "/backups/restore", Some(&auth), Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["restored"], filename.as_str());

    let (status, _, cleaned) = send(state, "POST", "/backups/cleanup", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleaned["deleted"], 0);
  }

  #[tokio::test]
  async fn restore_validates_names() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let (status, _, body) = send(
      state.clone(),
      "POST",
      "/backups/restore",
      Some(&auth),
      Some(r#"{"filename":"../../etc/passwd"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid backup file name"));

    let (status, _, _) = send(
      state,
      "POST",
      "/backups/restore",
      Some(&auth),
      Some(r#"{"filename":"dev-20200101000000.db"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Stats ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recalculate_words_and_reject_unknown_selector() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "secret");
    state
      .stats
      .store()
      .add_post(NewPost {
        title:      "hi".into(),
        content:    "three little words".into(),
        published:  true,
        created_at: Utc::now(),
      })
      .await
      .unwrap();

    let (status, _, summary) = send(
      state.clone(),
      "POST",
      "/stats/recalculate",
      Some(&auth),
      Some(r#"{"type":"words"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["kind"], "words");
    assert_eq!(summary["words"]["updated"].as_array().unwrap().len(), 1);
    assert!(summary["days_processed"].is_null());

    let (status, _, body) = send(
      state,
      "POST",
      "/stats/recalculate",
      Some(&auth),
      Some(r#"{"type":"weekly"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn daily_rollups_after_recalculation() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "secret");
    state.stats.store().record_visit(NewVisit::new("1.2.3.4", "/", Utc::now())).await.unwrap();

    let (status, _, summary) = send(
      state.clone(),
      "POST",
      "/stats/recalculate",
      Some(&auth),
      Some(r#"{"type":"daily","days":2}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["days_processed"], 3);

    let (status, _, rows) = send(state.clone(), "GET", "/stats/daily", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    let total: u64 = rows.as_array().unwrap().iter().map(|r| r["pv"].as_u64().unwrap()).sum();
    assert_eq!(total, 1);

    let (status, _, report) = send(state.clone(), "GET", "/stats/verify", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);

    let (status, _, _) =
      send(state, "GET", "/stats/daily?from=yesterday", Some(&auth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Migrations ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn migrations_endpoints() {
    let (state, _tmp) = make_state("secret").await;
    let auth = auth_header("admin", "secret");

    let (status, _, _) = send(
      state.clone(),
      "POST",
      "/migrations",
      Some(&auth),
      Some(r#"{"name":"add tags"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, outcome) = send(
      state.clone(),
      "POST",
      "/migrations",
      Some(&auth),
      Some(r#"{"name":"noop"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["migration"], "noop");

    let (status, _, history) = send(state.clone(), "GET", "/migrations", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["status"], "success");
    assert_eq!(history[0]["backupFile"], outcome["backup"]);

    let (status, _, deployed) =
      send(state, "POST", "/migrations/deploy", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deployed["applied"], serde_json::json!([]));
  }
}
