//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enumerations are stored as snake_case tags.

use chrono::{DateTime, Utc};
use covenant_core::{
  chat::{ChatMessage, ChatRole},
  contract::{Contract, ContractStatus, ContractVersion},
  recipient::{ContractRecipient, RecipientStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ─────────────────────────────────────────────────────────────

pub fn encode_contract_status(s: ContractStatus) -> &'static str {
  match s {
    ContractStatus::PendingUpload => "pending_upload",
    ContractStatus::Active => "active",
  }
}

pub fn decode_contract_status(s: &str) -> Result<ContractStatus> {
  match s {
    "pending_upload" => Ok(ContractStatus::PendingUpload),
    "active" => Ok(ContractStatus::Active),
    other => Err(Error::Decode(format!("unknown contract status: {other:?}"))),
  }
}

pub fn encode_recipient_status(s: RecipientStatus) -> &'static str {
  match s {
    RecipientStatus::Pending => "pending",
    RecipientStatus::Signed => "signed",
  }
}

pub fn decode_recipient_status(s: &str) -> Result<RecipientStatus> {
  match s {
    "pending" => Ok(RecipientStatus::Pending),
    "signed" => Ok(RecipientStatus::Signed),
    other => Err(Error::Decode(format!("unknown recipient status: {other:?}"))),
  }
}

pub fn encode_chat_role(r: ChatRole) -> &'static str {
  match r {
    ChatRole::User => "user",
    ChatRole::Assistant => "assistant",
  }
}

pub fn decode_chat_role(s: &str) -> Result<ChatRole> {
  match s {
    "user" => Ok(ChatRole::User),
    "assistant" => Ok(ChatRole::Assistant),
    other => Err(Error::Decode(format!("unknown chat role: {other:?}"))),
  }
}

// ─── Integers ─────────────────────────────────────────────────────────────────

pub fn decode_version_number(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("version number out of range: {n}")))
}

pub fn decode_size(n: Option<i64>) -> Result<Option<u64>> {
  n.map(|v| u64::try_from(v).map_err(|_| Error::Decode(format!("negative size: {v}"))))
    .transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `contracts` row.
pub struct RawContract {
  pub contract_id: String,
  pub title:       String,
  pub author_id:   String,
  pub status:      String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawContract {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id: row.get(0)?,
      title:       row.get(1)?,
      author_id:   row.get(2)?,
      status:      row.get(3)?,
      created_at:  row.get(4)?,
      updated_at:  row.get(5)?,
    })
  }

  pub fn into_contract(
    self,
    versions: Vec<RawVersion>,
    recipients: Vec<RawRecipient>,
  ) -> Result<Contract> {
    Ok(Contract {
      contract_id: decode_uuid(&self.contract_id)?,
      title:       self.title,
      author_id:   self.author_id,
      status:      decode_contract_status(&self.status)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      versions:    versions
        .into_iter()
        .map(RawVersion::into_version)
        .collect::<Result<_>>()?,
      recipients:  recipients
        .into_iter()
        .map(RawRecipient::into_recipient)
        .collect::<Result<_>>()?,
    })
  }
}

/// Raw values read from a `contract_versions` row.
pub struct RawVersion {
  pub version_id:     String,
  pub contract_id:    String,
  pub version_number: i64,
  pub object_key:     String,
  pub content_type:   String,
  pub size_hint:      Option<i64>,
  pub created_at:     String,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:     row.get(0)?,
      contract_id:    row.get(1)?,
      version_number: row.get(2)?,
      object_key:     row.get(3)?,
      content_type:   row.get(4)?,
      size_hint:      row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_version(self) -> Result<ContractVersion> {
    Ok(ContractVersion {
      version_id:     decode_uuid(&self.version_id)?,
      contract_id:    decode_uuid(&self.contract_id)?,
      version_number: decode_version_number(self.version_number)?,
      object_key:     self.object_key,
      content_type:   self.content_type,
      size_hint:      decode_size(self.size_hint)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `contract_recipients` row.
pub struct RawRecipient {
  pub contract_id: String,
  pub email:       String,
  pub status:      String,
  pub signed_at:   Option<String>,
}

impl RawRecipient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id: row.get(0)?,
      email:       row.get(1)?,
      status:      row.get(2)?,
      signed_at:   row.get(3)?,
    })
  }

  pub fn into_recipient(self) -> Result<ContractRecipient> {
    Ok(ContractRecipient {
      contract_id: decode_uuid(&self.contract_id)?,
      email:       self.email,
      status:      decode_recipient_status(&self.status)?,
      signed_at:   self.signed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read from a `chat_messages` row.
pub struct RawMessage {
  pub message_id: String,
  pub session_id: String,
  pub sequence:   i64,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id: row.get(0)?,
      session_id: row.get(1)?,
      sequence:   row.get(2)?,
      role:       row.get(3)?,
      content:    row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      message_id: decode_uuid(&self.message_id)?,
      session_id: decode_uuid(&self.session_id)?,
      sequence:   decode_version_number(self.sequence)?,
      role:       decode_chat_role(&self.role)?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
