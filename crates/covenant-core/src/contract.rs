//! Contract and ContractVersion: the document envelope and its append-only
//! file history.
//!
//! A contract owns an ordered list of versions. Each version points at one
//! object in the `contracts` bucket; versions are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recipient::ContractRecipient;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a contract sits in its upload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
  /// An upload URL has been issued for the latest version but the object has
  /// not been confirmed in storage.
  #[serde(rename = "Pending Upload")]
  PendingUpload,
  /// The latest version's object has been confirmed in storage.
  #[serde(rename = "Active")]
  Active,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One uploaded (or pending) file for a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractVersion {
  pub version_id:     Uuid,
  pub contract_id:    Uuid,
  /// Starts at 1 and increases by exactly one per appended version.
  pub version_number: u32,
  /// Key of the object inside the contracts bucket.
  pub object_key:     String,
  pub content_type:   String,
  pub size_hint:      Option<u64>,
  pub created_at:     DateTime<Utc>,
}

/// A contract together with its versions (ascending by number) and its
/// current recipient set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
  pub contract_id: Uuid,
  pub title:       String,
  /// Subject id of the identity that created the contract.
  pub author_id:   String,
  pub status:      ContractStatus,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub versions:    Vec<ContractVersion>,
  pub recipients:  Vec<ContractRecipient>,
}

impl Contract {
  /// The version with the highest version number, independent of the order
  /// in which `versions` happens to be stored.
  pub fn latest_version(&self) -> Option<&ContractVersion> {
    self.versions.iter().max_by_key(|v| v.version_number)
  }

  pub fn has_recipient(&self, email: &str) -> bool {
    self.recipients.iter().any(|r| r.email == email)
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Store input describing a version to append. Identity, number and
/// timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct VersionDraft {
  pub object_key:   String,
  pub content_type: String,
  pub size_hint:    Option<u64>,
}

/// Store input for a new contract and its first version, written atomically.
#[derive(Debug, Clone)]
pub struct ContractDraft {
  pub title:         String,
  pub author_id:     String,
  pub first_version: VersionDraft,
}
