//! Server configuration: `quill.toml` layered under `QUILL_*` variables.

use std::path::Path;

use anyhow::Context as _;
use quill_ops::OpsConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_admin")]
  pub admin_username:      String,
  /// argon2 PHC string; see `quill hash-password`.
  #[serde(default)]
  pub admin_password_hash: String,
  #[serde(flatten)]
  pub ops:                 OpsConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 3100 }

fn default_admin() -> String { "admin".to_string() }

/// Read `path` (optional) and the environment into a [`ServerConfig`].
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("QUILL").try_parsing(true))
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}
