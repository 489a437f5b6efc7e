//! Handlers for `/contracts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/contracts` | Body: `{"title","filename","content_type"?,"size"?}` |
//! | `GET`  | `/contracts` | Contracts authored by the caller |
//! | `GET`  | `/contracts/{id}` | Author or recipient |
//! | `GET`  | `/contracts/{id}/file` | Download URL for the latest version |
//! | `GET`  | `/contracts/{id}/versions/{n}/file` | Download URL for version `n` |
//! | `POST` | `/contracts/{id}/versions` | New version, returns an upload URL |
//! | `POST` | `/contracts/{id}/confirm` | Mark the latest upload present |
//! | `POST` | `/contracts/{id}/recipients` | Body: `{"emails":[..]}`, full replace |
//! | `PUT`  | `/contracts/{id}/sign` | Body: `{"email"}` |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use covenant_core::{
  agent::AnswerAgent,
  contract::{Contract, ContractVersion},
  recipient::ContractRecipient,
  service::{NewContract, NewVersion},
  storage::ObjectStorage,
  store::ContractStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, error::ApiError, identity::MaybeIdentity};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:        String,
  pub filename:     String,
  #[serde(default)]
  pub content_type: Option<String>,
  #[serde(default)]
  pub size:         Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CreatedBody {
  pub contract:   Contract,
  pub upload_url: String,
}

/// `POST /contracts`
pub async fn create<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Json(body) = body?;
  let caller = identity.caller();
  let created = state
    .lifecycle
    .create_contract(
      NewContract {
        title:        body.title,
        filename:     body.filename,
        content_type: body.content_type,
        size:         body.size,
      },
      caller.as_ref(),
    )
    .await?;
  Ok((
    StatusCode::CREATED,
    Json(CreatedBody { contract: created.contract, upload_url: created.upload_url }),
  ))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /contracts`
pub async fn list<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
) -> Result<Json<Vec<Contract>>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let caller = identity.caller();
  Ok(Json(state.lifecycle.list_contracts(caller.as_ref()).await?))
}

/// `GET /contracts/{id}`
pub async fn get_one<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Contract>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let caller = identity.caller();
  Ok(Json(state.lifecycle.get_contract(id, caller.as_ref()).await?))
}

/// `GET /contracts/{id}/file`
pub async fn file_url<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let caller = identity.caller();
  let url = state.lifecycle.get_contract_file_url(id, caller.as_ref()).await?;
  Ok(Json(json!({ "url": url })))
}

/// `GET /contracts/{id}/versions/{n}/file`
pub async fn version_file_url<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  path: Result<Path<(Uuid, u32)>, PathRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path((id, number)) = path?;
  let caller = identity.caller();
  let url = state
    .lifecycle
    .get_version_file_url(id, number, caller.as_ref())
    .await?;
  Ok(Json(json!({ "url": url })))
}

// ─── Versions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VersionBody {
  pub filename:     String,
  #[serde(default)]
  pub content_type: Option<String>,
  #[serde(default)]
  pub size:         Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CreatedVersionBody {
  pub version:    ContractVersion,
  pub upload_url: String,
}

/// `POST /contracts/{id}/versions`
pub async fn add_version<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<VersionBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let caller = identity.caller();
  let created = state
    .lifecycle
    .add_version(
      id,
      NewVersion {
        filename:     body.filename,
        content_type: body.content_type,
        size:         body.size,
      },
      caller.as_ref(),
    )
    .await?;
  Ok((
    StatusCode::CREATED,
    Json(CreatedVersionBody { version: created.version, upload_url: created.upload_url }),
  ))
}

/// `POST /contracts/{id}/confirm`
pub async fn confirm<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Contract>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let caller = identity.caller();
  Ok(Json(state.lifecycle.confirm_upload(id, caller.as_ref()).await?))
}

// ─── Recipients ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecipientsBody {
  pub emails: Vec<String>,
}

/// `POST /contracts/{id}/recipients`
pub async fn update_recipients<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<RecipientsBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let caller = identity.caller();
  state
    .lifecycle
    .update_recipients(id, &body.emails, caller.as_ref())
    .await?;
  Ok(Json(json!({ "status": "updated" })))
}

#[derive(Debug, Deserialize)]
pub struct SignBody {
  pub email: String,
}

/// `PUT /contracts/{id}/sign`
pub async fn sign<S, G, A>(
  State(state): State<AppState<S, G, A>>,
  identity: MaybeIdentity,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<SignBody>, JsonRejection>,
) -> Result<Json<ContractRecipient>, ApiError>
where
  S: ContractStore + 'static,
  G: ObjectStorage + 'static,
  A: AnswerAgent + 'static,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let caller = identity.caller();
  Ok(Json(
    state
      .lifecycle
      .sign_contract(id, &body.email, caller.as_ref())
      .await?,
  ))
}
