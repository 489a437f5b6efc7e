//! [`LifecycleService`]: contract creation, versioning, recipients and
//! signing, orchestrated over a [`ContractStore`] and an [`ObjectStorage`].
//!
//! Authorization rules:
//!
//! | Operation | Who |
//! |-----------|-----|
//! | create, list | any verified caller |
//! | read contract / file URLs | author or listed recipient |
//! | add version, confirm upload, update recipients | author |
//! | sign | the recipient whose email the caller has verified |

use std::{sync::Arc, time::Duration};

use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  caller::Caller,
  contract::{Contract, ContractDraft, ContractStatus, ContractVersion, VersionDraft},
  recipient::{ContractRecipient, normalise_email, normalise_recipient_list},
  storage::{Access, ObjectStorage},
  store::ContractStore,
};

pub const DEFAULT_BUCKET: &str = "contracts";
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the lifecycle service.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
  pub bucket:               String,
  pub default_content_type: String,
  /// Lifetime of upload (PUT) URLs.
  pub upload_ttl:           Duration,
  /// Lifetime of download (GET) URLs handed to clients.
  pub download_ttl:         Duration,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      bucket:               DEFAULT_BUCKET.to_string(),
      default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
      upload_ttl:           Duration::from_secs(15 * 60),
      download_ttl:         Duration::from_secs(24 * 60 * 60),
    }
  }
}

// ─── Inputs and outputs ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewContract {
  pub title:        String,
  pub filename:     String,
  pub content_type: Option<String>,
  pub size:         Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewVersion {
  pub filename:     String,
  pub content_type: Option<String>,
  pub size:         Option<u64>,
}

/// A freshly created contract and the URL its first file must be PUT to.
#[derive(Debug, Clone)]
pub struct CreatedContract {
  pub contract:   Contract,
  pub upload_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatedVersion {
  pub version:    ContractVersion,
  pub upload_url: String,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct LifecycleService<S, G> {
  store:   Arc<S>,
  storage: Arc<G>,
  policy:  LifecyclePolicy,
}

impl<S, G> LifecycleService<S, G>
where
  S: ContractStore,
  G: ObjectStorage,
{
  pub fn new(store: Arc<S>, storage: Arc<G>, policy: LifecyclePolicy) -> Self {
    Self { store, storage, policy }
  }

  // ── Create ────────────────────────────────────────────────────────────

  pub async fn create_contract(
    &self,
    input: NewContract,
    caller: Option<&Caller>,
  ) -> Result<CreatedContract> {
    let caller = caller.ok_or(Error::Unauthenticated)?;

    let title = input.title.trim();
    if title.is_empty() {
      return Err(Error::invalid("title is required"));
    }
    let filename = validate_filename(&input.filename)?;

    let object_key = self.prepare_object(filename).await?;
    let upload_url = self.presign(Access::Put, &object_key, self.policy.upload_ttl).await?;

    let contract = self
      .store
      .create_contract(ContractDraft {
        title:         title.to_string(),
        author_id:     caller.subject.clone(),
        first_version: VersionDraft {
          object_key:   object_key.clone(),
          content_type: self.content_type(input.content_type),
          size_hint:    input.size,
        },
      })
      .await
      .map_err(Error::from_backend)?;

    info!(
      contract_id = %contract.contract_id,
      author = %caller.subject,
      object_key = %object_key,
      "contract created, awaiting upload"
    );

    Ok(CreatedContract { contract, upload_url })
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn list_contracts(&self, caller: Option<&Caller>) -> Result<Vec<Contract>> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    self
      .store
      .list_contracts_by_author(&caller.subject)
      .await
      .map_err(Error::from_backend)
  }

  pub async fn get_contract(&self, contract_id: Uuid, caller: Option<&Caller>) -> Result<Contract> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let contract = self.load(contract_id).await?;
    if !caller.can_read(&contract) {
      return Err(Error::PermissionDenied);
    }
    Ok(contract)
  }

  /// Resolve the latest version of a contract the caller may read.
  pub async fn readable_latest(
    &self,
    contract_id: Uuid,
    caller: Option<&Caller>,
  ) -> Result<(Contract, ContractVersion)> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let contract = self.load(contract_id).await?;
    if !caller.can_read(&contract) {
      return Err(Error::PermissionDenied);
    }
    let latest = self
      .store
      .latest_version(contract_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::not_found(format!("file for contract {contract_id}")))?;
    Ok((contract, latest))
  }

  pub async fn get_contract_file_url(
    &self,
    contract_id: Uuid,
    caller: Option<&Caller>,
  ) -> Result<String> {
    let (_, latest) = self.readable_latest(contract_id, caller).await?;
    self.presign_read(&latest, self.policy.download_ttl).await
  }

  /// Download URL for a specific, possibly superseded, version.
  pub async fn get_version_file_url(
    &self,
    contract_id: Uuid,
    version_number: u32,
    caller: Option<&Caller>,
  ) -> Result<String> {
    let contract = self.get_contract(contract_id, caller).await?;
    let version = self
      .store
      .get_version(contract.contract_id, version_number)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| {
        Error::not_found(format!("version {version_number} of contract {contract_id}"))
      })?;
    self.presign_read(&version, self.policy.download_ttl).await
  }

  /// Issue a GET URL for a version's object.
  pub async fn presign_read(&self, version: &ContractVersion, ttl: Duration) -> Result<String> {
    self.presign(Access::Get, &version.object_key, ttl).await
  }

  // ── Versions ──────────────────────────────────────────────────────────

  pub async fn add_version(
    &self,
    contract_id: Uuid,
    input: NewVersion,
    caller: Option<&Caller>,
  ) -> Result<CreatedVersion> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let filename = validate_filename(&input.filename)?;
    let contract = self.load(contract_id).await?;
    if !caller.is_author_of(&contract) {
      return Err(Error::PermissionDenied);
    }

    let object_key = self.prepare_object(filename).await?;
    let upload_url = self.presign(Access::Put, &object_key, self.policy.upload_ttl).await?;

    let version = self
      .store
      .append_version(contract_id, VersionDraft {
        object_key:   object_key.clone(),
        content_type: self.content_type(input.content_type),
        size_hint:    input.size,
      })
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::not_found(format!("contract {contract_id}")))?;

    info!(
      contract_id = %contract_id,
      version = version.version_number,
      object_key = %object_key,
      "version appended, awaiting upload"
    );

    Ok(CreatedVersion { version, upload_url })
  }

  /// Probe storage for the latest version's object and, if present, mark
  /// the contract `Active`.
  pub async fn confirm_upload(&self, contract_id: Uuid, caller: Option<&Caller>) -> Result<Contract> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let contract = self.load(contract_id).await?;
    if !caller.is_author_of(&contract) {
      return Err(Error::PermissionDenied);
    }
    let latest = contract
      .latest_version()
      .ok_or_else(|| Error::not_found(format!("file for contract {contract_id}")))?;

    let present = self
      .storage
      .object_exists(&self.policy.bucket, &latest.object_key)
      .await
      .map_err(Error::from_backend)?;
    if !present {
      return Err(Error::FailedPrecondition(format!(
        "version {} has not been uploaded yet",
        latest.version_number
      )));
    }

    if contract.status == ContractStatus::Active {
      return Ok(contract);
    }

    let updated = match self
      .store
      .activate_version(contract_id, latest.version_number)
      .await
      .map_err(Error::from_backend)?
    {
      Some(updated) => updated,
      None => {
        self.load(contract_id).await?;
        return Err(Error::Conflict(format!(
          "version {} was superseded before its upload was confirmed",
          latest.version_number
        )));
      }
    };

    info!(contract_id = %contract_id, version = latest.version_number, "upload confirmed");
    Ok(updated)
  }

  // ── Recipients ────────────────────────────────────────────────────────

  /// Replace the full recipient set. Recipients that are removed and re-added
  /// in the same call start over as `Pending`.
  pub async fn update_recipients(
    &self,
    contract_id: Uuid,
    emails: &[String],
    caller: Option<&Caller>,
  ) -> Result<Vec<ContractRecipient>> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let emails = normalise_recipient_list(emails)?;
    let contract = self.load(contract_id).await?;
    if !caller.is_author_of(&contract) {
      return Err(Error::PermissionDenied);
    }

    let count = emails.len();
    let recipients = self
      .store
      .replace_recipients(contract_id, emails)
      .await
      .map_err(Error::from_backend)?;

    info!(contract_id = %contract_id, count, "recipients replaced");
    Ok(recipients)
  }

  /// Record the caller's signature. Signing twice keeps the first
  /// `signed_at`.
  pub async fn sign_contract(
    &self,
    contract_id: Uuid,
    email: &str,
    caller: Option<&Caller>,
  ) -> Result<ContractRecipient> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let email = normalise_email(email);
    if email.is_empty() {
      return Err(Error::invalid("email is required"));
    }

    // Checked before the lookup so callers cannot probe the recipient list.
    if caller.email.as_deref() != Some(email.as_str()) {
      return Err(Error::PermissionDenied);
    }
    let recipient = self
      .store
      .get_recipient(contract_id, &email)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::not_found(format!("recipient {email}")))?;

    if recipient.is_signed() {
      return Ok(recipient);
    }

    let signed = self
      .store
      .mark_signed(contract_id, &email)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::not_found(format!("recipient {email}")))?;

    info!(contract_id = %contract_id, recipient = %email, "contract signed");
    Ok(signed)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn load(&self, contract_id: Uuid) -> Result<Contract> {
    self
      .store
      .get_contract(contract_id)
      .await
      .map_err(Error::from_backend)?
      .ok_or_else(|| Error::not_found(format!("contract {contract_id}")))
  }

  /// Ensure the bucket exists and derive a fresh object key for `filename`.
  async fn prepare_object(&self, filename: &str) -> Result<String> {
    self
      .storage
      .ensure_bucket(&self.policy.bucket)
      .await
      .map_err(Error::from_backend)?;
    Ok(object_key_for(filename))
  }

  async fn presign(&self, access: Access, key: &str, ttl: Duration) -> Result<String> {
    self
      .storage
      .presign(access, &self.policy.bucket, key, ttl)
      .await
      .map_err(Error::from_backend)
  }

  fn content_type(&self, requested: Option<String>) -> String {
    requested
      .map(|ct| ct.trim().to_string())
      .filter(|ct| !ct.is_empty())
      .unwrap_or_else(|| self.policy.default_content_type.clone())
  }
}

/// Keys are `<uuid-v4>-<filename>`, unique without any retry.
pub fn object_key_for(filename: &str) -> String {
  format!("{}-{}", Uuid::new_v4(), filename)
}

fn validate_filename(raw: &str) -> Result<&str> {
  let filename = raw.trim();
  if filename.is_empty() {
    return Err(Error::invalid("filename is required"));
  }
  if filename.contains(['/', '\\']) {
    return Err(Error::invalid("filename must not contain path separators"));
  }
  Ok(filename)
}
