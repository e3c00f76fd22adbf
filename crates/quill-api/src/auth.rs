//! Basic auth for the admin routes.
//!
//! There is exactly one administrator. Its password is stored only as an
//! argon2 PHC string, so the config file never holds the secret itself.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use quill_core::store::StatsStore;
use tracing::{error, warn};

use crate::{AppState, error::ApiError};

/// The single administrator allowed to trigger maintenance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Proof that the handler runs on behalf of the administrator.
pub struct Authenticated;

/// Why a request was turned away. Only ever logged; clients see a bare 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
  MissingHeader,
  Malformed,
  UnknownUser,
  WrongPassword,
  /// The configured hash is not a PHC string.
  Misconfigured,
}

/// `user:password` carried by an `Authorization: Basic …` header.
struct Credentials {
  username: String,
  password: String,
}

impl Credentials {
  fn from_headers(headers: &HeaderMap) -> Result<Self, Denied> {
    let value = headers.get(header::AUTHORIZATION).ok_or(Denied::MissingHeader)?;
    let value = value.to_str().map_err(|_| Denied::Malformed)?;

    // The scheme name is case-insensitive.
    let (scheme, encoded) = value.split_once(' ').ok_or(Denied::Malformed)?;
    if !scheme.eq_ignore_ascii_case("basic") {
      return Err(Denied::Malformed);
    }

    let decoded = B64.decode(encoded.trim()).map_err(|_| Denied::Malformed)?;
    let pair    = String::from_utf8(decoded).map_err(|_| Denied::Malformed)?;
    match pair.split_once(':') {
      Some((username, password)) => Ok(Self {
        username: username.to_owned(),
        password: password.to_owned(),
      }),
      None => Err(Denied::Malformed),
    }
  }
}

/// Check the request headers against the administrator credentials.
pub fn check(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Denied> {
  let creds = Credentials::from_headers(headers)?;
  if creds.username != config.username {
    return Err(Denied::UnknownUser);
  }
  let hash = PasswordHash::new(&config.password_hash).map_err(|_| Denied::Misconfigured)?;
  Argon2::default()
    .verify_password(creds.password.as_bytes(), &hash)
    .map_err(|_| Denied::WrongPassword)
}

/// [`check`] with the reason collapsed into the API's 401.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  check(headers, config).map_err(|_| ApiError::Unauthorized)
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: StatsStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match check(&parts.headers, &state.auth) {
      Ok(()) => Ok(Authenticated),
      Err(Denied::Misconfigured) => {
        error!("admin_password_hash is not a valid argon2 PHC string");
        Err(ApiError::Unauthorized)
      }
      Err(reason) => {
        warn!(path = %parts.uri.path(), ?reason, "rejected admin request");
        Err(ApiError::Unauthorized)
      }
    }
  }
}
