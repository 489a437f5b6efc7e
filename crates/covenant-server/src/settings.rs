//! Runtime configuration, deserialised from an optional TOML file layered
//! under `COVENANT_*` environment variables.
//!
//! Nested keys use `__` in the environment, e.g.
//! `COVENANT_STORAGE__ACCESS_KEY` sets `storage.access_key`.
//! `COVENANT_CORS__ALLOWED_ORIGINS` takes a comma-separated list.

use std::{path::PathBuf, time::Duration};

use covenant_api::{AuthSettings, CorsSettings, agent::DEFAULT_AGENT_ENDPOINT};
use covenant_core::service::DEFAULT_BUCKET;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub server:   ServerSettings,
  pub cors:     CorsSettings,
  pub database: DatabaseSettings,
  pub storage:  StorageSettings,
  pub auth:     AuthSettings,
  pub agent:    AgentSettings,
  pub startup:  StartupSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
  pub host: String,
  pub port: u16,
}

impl Default for ServerSettings {
  fn default() -> Self { Self { host: "0.0.0.0".into(), port: 8000 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
  /// SQLite database file. A leading `~/` is expanded.
  pub path: PathBuf,
}

impl Default for DatabaseSettings {
  fn default() -> Self { Self { path: PathBuf::from("covenant.db") } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
  pub endpoint:     String,
  pub region:       String,
  pub access_key:   String,
  pub secret_key:   String,
  pub bucket:       String,
  pub timeout_secs: u64,
}

impl Default for StorageSettings {
  fn default() -> Self {
    Self {
      endpoint:     "http://minio:9000".into(),
      region:       "us-east-1".into(),
      access_key:   String::new(),
      secret_key:   String::new(),
      bucket:       DEFAULT_BUCKET.into(),
      timeout_secs: 10,
    }
  }
}

impl StorageSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
  pub endpoint:     String,
  pub timeout_secs: u64,
}

impl Default for AgentSettings {
  fn default() -> Self {
    Self { endpoint: DEFAULT_AGENT_ENDPOINT.into(), timeout_secs: 60 }
  }
}

impl AgentSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
  pub db_retries:          u32,
  pub db_retry_delay_secs: u64,
}

impl Default for StartupSettings {
  fn default() -> Self { Self { db_retries: 10, db_retry_delay_secs: 3 } }
}

impl StartupSettings {
  pub fn db_retry_delay(&self) -> Duration { Duration::from_secs(self.db_retry_delay_secs) }
}

// ─── Loading ──────────────────────────────────────────────────────────────────

pub fn environment() -> config::Environment {
  config::Environment::with_prefix("COVENANT")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
    .list_separator(",")
    .with_list_parse_key("cors.allowed_origins")
}

/// Layer `file` (if present) under the process environment.
pub fn load(file: PathBuf) -> Result<Settings, config::ConfigError> {
  config::Config::builder()
    .add_source(config::File::from(file).required(false))
    .add_source(environment())
    .build()?
    .try_deserialize()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn from_toml(toml: &str) -> Settings {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_yields_defaults() {
    let s = from_toml("");
    assert_eq!(s.server.port, 8000);
    assert_eq!(s.storage.bucket, "contracts");
    assert_eq!(s.agent.endpoint, "http://ai-agent:3000/ask");
    assert_eq!(s.startup.db_retries, 10);
    assert_eq!(s.startup.db_retry_delay(), Duration::from_secs(3));
    assert!(s.auth.project_id.is_none());
    assert_eq!(s.cors.allowed_origins, vec!["*".to_string()]);
  }

  #[test]
  fn file_values_override_defaults_per_key() {
    let s = from_toml(
      r#"
      [server]
      port = 9090

      [cors]
      allowed_origins = ["http://localhost:3000"]

      [storage]
      endpoint = "http://localhost:9000"
      access_key = "minio"
      secret_key = "minio123"

      [auth]
      secret = "s3cret"
      project_id = "proj-1"
      "#,
    );
    assert_eq!(s.server.host, "0.0.0.0");
    assert_eq!(s.server.port, 9090);
    assert_eq!(s.cors.allowed_origins, vec!["http://localhost:3000".to_string()]);
    assert_eq!(s.storage.endpoint, "http://localhost:9000");
    assert_eq!(s.storage.region, "us-east-1");
    assert_eq!(s.auth.secret, "s3cret");
    assert_eq!(s.auth.project_id.as_deref(), Some("proj-1"));
  }
}
