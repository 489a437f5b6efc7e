//! `POST /chat/ask`: relay a question about a contract to the agent.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use covenant_core::{agent::AnswerAgent, storage::ObjectStorage, store::ContractStore};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, error::ApiError, identity::MaybeIdentity};

#[derive(Debug, Deserialize)]
pub struct AskBody {
  pub contract_id: Uuid,
  pub question:    String,
}

/// The agent's body is returned untouched under `response`.
pub async fn ask<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  body: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Json(body) = body?;
  let caller = identity.caller();
  let answer = state
    .bridge
    .ask(body.contract_id, &body.question, caller.as_ref())
    .await?;
  Ok(Json(json!({ "response": answer })))
}
