//! Recipients: the people asked to sign a contract.
//!
//! A recipient is keyed by `(contract_id, email)`. Its status moves from
//! `Pending` to `Signed` once and never back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientStatus {
  Pending,
  Signed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecipient {
  pub contract_id: Uuid,
  pub email:       String,
  pub status:      RecipientStatus,
  pub signed_at:   Option<DateTime<Utc>>,
}

impl ContractRecipient {
  pub fn is_signed(&self) -> bool { self.status == RecipientStatus::Signed }
}

/// Canonical form used as the natural key: trimmed and lower-cased.
pub fn normalise_email(raw: &str) -> String { raw.trim().to_lowercase() }

/// Validate and canonicalise a submitted recipient list.
///
/// Duplicates (after normalisation) collapse to one entry; the first
/// occurrence decides the position.
pub fn normalise_recipient_list(raw: &[String]) -> Result<Vec<String>> {
  let mut out: Vec<String> = Vec::with_capacity(raw.len());
  for entry in raw {
    let email = normalise_email(entry);
    if email.is_empty() {
      return Err(Error::invalid("recipient email must not be empty"));
    }
    if !looks_like_email(&email) {
      return Err(Error::invalid(format!("{email:?} is not an email address")));
    }
    if !out.contains(&email) {
      out.push(email);
    }
  }
  Ok(out)
}

fn looks_like_email(s: &str) -> bool {
  match s.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && !domain.is_empty() && !s.contains(char::is_whitespace)
    }
    None => false,
  }
}
