//! The `ContractStore` trait: the transactional record layer.
//!
//! Implemented by storage backends (e.g. `covenant-store-sqlite`). The
//! lifecycle service depends on this abstraction, never on a concrete
//! backend, so tests can run against an in-memory database.

use std::future::Future;

use uuid::Uuid;

use crate::{
  chat::{ChatMessage, ChatRole, ChatSession},
  contract::{Contract, ContractDraft, ContractVersion, VersionDraft},
  recipient::ContractRecipient,
};

/// Abstraction over a Covenant record store backend.
///
/// Versions are append-only. Recipient sets are replaced wholesale. Backend
/// errors convert into [`crate::Error`]; a lost race on a version number must
/// convert into [`crate::Error::Conflict`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ContractStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Contracts ─────────────────────────────────────────────────────────

  /// Persist a contract in `PendingUpload` status together with version 1,
  /// in one transaction.
  fn create_contract(
    &self,
    draft: ContractDraft,
  ) -> impl Future<Output = Result<Contract, Self::Error>> + Send + '_;

  /// Fetch a contract with its versions and recipients. `None` if absent.
  fn get_contract(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  /// All contracts authored by `author_id`, with versions and recipients.
  fn list_contracts_by_author<'a>(
    &'a self,
    author_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + 'a;

  /// Mark the contract `Active` and bump `updated_at`, but only while
  /// `version_number` is still its latest version. Returns the updated
  /// contract, or `None` (with no write) if the contract does not exist or a
  /// newer version has been appended since.
  fn activate_version(
    &self,
    contract_id: Uuid,
    version_number: u32,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  // ── Versions ──────────────────────────────────────────────────────────

  /// Append the next version (max + 1) for a contract and move the contract
  /// back to `PendingUpload`. Number assignment is serialised per contract.
  /// Returns `None` if the contract does not exist.
  fn append_version(
    &self,
    contract_id: Uuid,
    draft: VersionDraft,
  ) -> impl Future<Output = Result<Option<ContractVersion>, Self::Error>> + Send + '_;

  /// The version with the highest version number, if any.
  fn latest_version(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Option<ContractVersion>, Self::Error>> + Send + '_;

  /// A specific version by number.
  fn get_version(
    &self,
    contract_id: Uuid,
    version_number: u32,
  ) -> impl Future<Output = Result<Option<ContractVersion>, Self::Error>> + Send + '_;

  // ── Recipients ────────────────────────────────────────────────────────

  /// Atomically delete every recipient of the contract and insert one
  /// `Pending` row per email. On failure the prior set is left untouched.
  fn replace_recipients(
    &self,
    contract_id: Uuid,
    emails: Vec<String>,
  ) -> impl Future<Output = Result<Vec<ContractRecipient>, Self::Error>> + Send + '_;

  fn get_recipient<'a>(
    &'a self,
    contract_id: Uuid,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<ContractRecipient>, Self::Error>> + Send + 'a;

  /// Move a `Pending` recipient to `Signed` with `signed_at = now`. A
  /// recipient that is already signed is left as is. Returns the row as
  /// stored afterwards, or `None` (with no write) if it does not exist.
  fn mark_signed<'a>(
    &'a self,
    contract_id: Uuid,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<ContractRecipient>, Self::Error>> + Send + 'a;

  // ── Chat ──────────────────────────────────────────────────────────────
  //
  // Persistence only: no service operation reads or writes chat history yet.

  fn open_chat_session<'a>(
    &'a self,
    contract_id: Uuid,
    user_id: &'a str,
  ) -> impl Future<Output = Result<ChatSession, Self::Error>> + Send + 'a;

  /// Append a message at the end of a session.
  fn append_chat_message(
    &self,
    session_id: Uuid,
    role: ChatRole,
    content: String,
  ) -> impl Future<Output = Result<ChatMessage, Self::Error>> + Send + '_;

  /// Messages of a session in sequence order.
  fn chat_messages(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + '_;
}
