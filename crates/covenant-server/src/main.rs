//! covenant-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `COVENANT_*` environment variables, opens the SQLite store, connects the
//! S3-compatible gateway and the answering agent, and serves the JSON API.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::{Context as _, bail};
use clap::Parser;
use covenant_api::{AppState, HttpAgent, TokenVerifier};
use covenant_core::{
  bridge::QuestionBridge,
  service::{LifecyclePolicy, LifecycleService},
  storage::ObjectStorage,
};
use covenant_objects::{S3Config, S3Gateway};
use covenant_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// How long the agent may fetch a contract file it was asked about.
const AGENT_READ_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(author, version, about = "Covenant contract service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = settings::load(cli.config).context("failed to load configuration")?;
  if settings.auth.secret.is_empty() {
    bail!("auth.secret must be set (COVENANT_AUTH__SECRET)");
  }

  // Store.
  let db_path = expand_tilde(&settings.database.path);
  let store = SqliteStore::open_with_retry(
    &db_path,
    settings.startup.db_retries,
    settings.startup.db_retry_delay(),
  )
  .await
  .with_context(|| format!("failed to open database at {db_path:?}"))?;

  // Object storage.
  let gateway = S3Gateway::connect(S3Config {
    endpoint:   settings.storage.endpoint.clone(),
    region:     settings.storage.region.clone(),
    access_key: settings.storage.access_key.clone(),
    secret_key: settings.storage.secret_key.clone(),
    timeout:    settings.storage.timeout(),
  })
  .await
  .context("failed to configure object storage")?;

  if let Err(e) = gateway.ensure_bucket(&settings.storage.bucket).await {
    warn!(bucket = %settings.storage.bucket, error = %e, "could not ensure storage bucket at startup");
  }

  // Answering agent.
  let agent = HttpAgent::new(settings.agent.endpoint.clone(), settings.agent.timeout())
    .context("failed to build agent client")?;

  // Services.
  let lifecycle = Arc::new(LifecycleService::new(
    Arc::new(store),
    Arc::new(gateway),
    LifecyclePolicy {
      bucket: settings.storage.bucket.clone(),
      ..LifecyclePolicy::default()
    },
  ));
  let bridge = Arc::new(QuestionBridge::new(
    Arc::clone(&lifecycle),
    Arc::new(agent),
    AGENT_READ_TTL,
  ));
  let state = AppState {
    lifecycle,
    bridge,
    verifier: Arc::new(TokenVerifier::new(&settings.auth)),
  };

  let app = covenant_api::router(state, &settings.cors);
  let address = format!("{}:{}", settings.server.host, settings.server.port);

  info!(agent = %settings.agent.endpoint, storage = %settings.storage.endpoint, "listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
