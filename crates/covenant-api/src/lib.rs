//! JSON REST API for Covenant.
//!
//! Exposes an axum [`Router`] backed by a [`LifecycleService`] and a
//! [`QuestionBridge`]. Identity comes from bearer tokens (see [`identity`]);
//! TLS is the deployment's responsibility.

pub mod agent;
pub mod chat;
pub mod contracts;
pub mod cors;
pub mod error;
pub mod identity;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::FromRef,
  routing::{get, post, put},
};
use covenant_core::{
  agent::AnswerAgent,
  bridge::QuestionBridge,
  service::LifecycleService,
  storage::ObjectStorage,
  store::ContractStore,
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use agent::HttpAgent;
pub use cors::CorsSettings;
pub use error::ApiError;
pub use identity::{AuthSettings, TokenVerifier};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, G, A> {
  pub lifecycle: Arc<LifecycleService<S, G>>,
  pub bridge:    Arc<QuestionBridge<S, G, A>>,
  pub verifier:  Arc<TokenVerifier>,
}

impl<S, G, A> Clone for AppState<S, G, A> {
  fn clone(&self) -> Self {
    Self {
      lifecycle: Arc::clone(&self.lifecycle),
      bridge:    Arc::clone(&self.bridge),
      verifier:  Arc::clone(&self.verifier),
    }
  }
}

impl<S, G, A> FromRef<AppState<S, G, A>> for Arc<TokenVerifier> {
  fn from_ref(state: &AppState<S, G, A>) -> Self { Arc::clone(&state.verifier) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Routes under `/api`, without state applied.
pub fn api_router<S, G, A>() -> Router<AppState<S, G, A>>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  Router::new()
    // Contracts
    .route(
      "/contracts",
      get(contracts::list::<S, G, A>).post(contracts::create::<S, G, A>),
    )
    .route("/contracts/{id}", get(contracts::get_one::<S, G, A>))
    .route("/contracts/{id}/file", get(contracts::file_url::<S, G, A>))
    .route(
      "/contracts/{id}/versions/{number}/file",
      get(contracts::version_file_url::<S, G, A>),
    )
    .route("/contracts/{id}/versions", post(contracts::add_version::<S, G, A>))
    .route("/contracts/{id}/confirm", post(contracts::confirm::<S, G, A>))
    .route("/contracts/{id}/recipients", post(contracts::update_recipients::<S, G, A>))
    .route("/contracts/{id}/sign", put(contracts::sign::<S, G, A>))
    // Chat
    .route("/chat/ask", post(chat::ask::<S, G, A>))
}

/// The complete HTTP surface: `/api/*`, `/healthz`, request tracing and
/// CORS for browser clients.
pub fn router<S, G, A>(state: AppState<S, G, A>, cors: &CorsSettings) -> Router
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  Router::new()
    .nest("/api", api_router())
    .route("/healthz", get(healthz))
    .layer(TraceLayer::new_for_http())
    .layer(cors.layer())
    .with_state(state)
}

async fn healthz() -> Json<Value> { Json(json!({ "status": "ok" })) }
