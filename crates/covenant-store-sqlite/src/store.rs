//! [`SqliteStore`]: the SQLite implementation of [`ContractStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::warn;
use uuid::Uuid;

use covenant_core::{
  chat::{ChatMessage, ChatRole, ChatSession},
  contract::{Contract, ContractDraft, ContractStatus, ContractVersion, VersionDraft},
  recipient::{ContractRecipient, RecipientStatus},
  store::ContractStore,
};

use crate::{
  Error, Result,
  encode::{
    RawContract, RawMessage, RawRecipient, RawVersion, encode_chat_role,
    encode_contract_status, encode_dt, encode_recipient_status, encode_uuid,
  },
  schema::SCHEMA,
};

const CONTRACT_COLUMNS: &str =
  "contract_id, title, author_id, status, created_at, updated_at";
const VERSION_COLUMNS: &str =
  "version_id, contract_id, version_number, object_key, content_type, size_hint, created_at";
const RECIPIENT_COLUMNS: &str = "contract_id, email, status, signed_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Covenant contract store backed by a single SQLite file.
///
/// Cheap to clone; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a store, retrying with a fixed delay between attempts.
  ///
  /// Only meant for process startup; request paths never retry.
  pub async fn open_with_retry(
    path: impl AsRef<Path>,
    attempts: u32,
    delay: Duration,
  ) -> Result<Self> {
    let path = path.as_ref();
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
      match Self::open(path).await {
        Ok(store) => return Ok(store),
        Err(e) if attempt < attempts => {
          warn!(attempt, attempts, error = %e, "failed to open database, retrying in {delay:?}");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── Row loaders (run on the database thread) ────────────────────────────────

fn load_versions(conn: &rusqlite::Connection, contract_id: &str) -> rusqlite::Result<Vec<RawVersion>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VERSION_COLUMNS} FROM contract_versions
     WHERE contract_id = ?1
     ORDER BY version_number ASC"
  ))?;
  stmt
    .query_map(rusqlite::params![contract_id], RawVersion::from_row)?
    .collect()
}

fn load_recipients(
  conn: &rusqlite::Connection,
  contract_id: &str,
) -> rusqlite::Result<Vec<RawRecipient>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {RECIPIENT_COLUMNS} FROM contract_recipients
     WHERE contract_id = ?1
     ORDER BY email ASC"
  ))?;
  stmt
    .query_map(rusqlite::params![contract_id], RawRecipient::from_row)?
    .collect()
}

type RawAggregate = (RawContract, Vec<RawVersion>, Vec<RawRecipient>);

fn load_aggregate(
  conn: &rusqlite::Connection,
  contract_id: &str,
) -> rusqlite::Result<Option<RawAggregate>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE contract_id = ?1"),
      rusqlite::params![contract_id],
      RawContract::from_row,
    )
    .optional()?;

  match raw {
    Some(raw) => {
      let versions = load_versions(conn, contract_id)?;
      let recipients = load_recipients(conn, contract_id)?;
      Ok(Some((raw, versions, recipients)))
    }
    None => Ok(None),
  }
}

fn into_contract((raw, versions, recipients): RawAggregate) -> Result<Contract> {
  raw.into_contract(versions, recipients)
}

// ─── ContractStore impl ──────────────────────────────────────────────────────

impl ContractStore for SqliteStore {
  type Error = Error;

  // ── Contracts ─────────────────────────────────────────────────────────────

  async fn create_contract(&self, draft: ContractDraft) -> Result<Contract> {
    let now = Utc::now();
    let contract_id = Uuid::new_v4();
    let version = ContractVersion {
      version_id:     Uuid::new_v4(),
      contract_id,
      version_number: 1,
      object_key:     draft.first_version.object_key,
      content_type:   draft.first_version.content_type,
      size_hint:      draft.first_version.size_hint,
      created_at:     now,
    };
    let contract = Contract {
      contract_id,
      title:      draft.title,
      author_id:  draft.author_id,
      status:     ContractStatus::PendingUpload,
      created_at: now,
      updated_at: now,
      versions:   vec![version.clone()],
      recipients: vec![],
    };

    let id_str      = encode_uuid(contract_id);
    let title       = contract.title.clone();
    let author_id   = contract.author_id.clone();
    let status_str  = encode_contract_status(contract.status).to_owned();
    let at_str      = encode_dt(now);
    let version_str = encode_uuid(version.version_id);
    let object_key  = version.object_key.clone();
    let content     = version.content_type.clone();
    let size        = version.size_hint.map(|s| s as i64);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO contracts (contract_id, title, author_id, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, title, author_id, status_str, at_str],
        )?;
        tx.execute(
          "INSERT INTO contract_versions (
             version_id, contract_id, version_number, object_key,
             content_type, size_hint, created_at
           ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6)",
          rusqlite::params![version_str, id_str, object_key, content, size, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(contract)
  }

  async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>> {
    let id_str = encode_uuid(contract_id);

    let raw = self
      .conn
      .call(move |conn| Ok(load_aggregate(conn, &id_str)?))
      .await?;

    raw.map(into_contract).transpose()
  }

  async fn list_contracts_by_author(&self, author_id: &str) -> Result<Vec<Contract>> {
    let author_id = author_id.to_owned();

    let raws: Vec<RawAggregate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTRACT_COLUMNS} FROM contracts
           WHERE author_id = ?1
           ORDER BY created_at ASC"
        ))?;
        let contracts = stmt
          .query_map(rusqlite::params![author_id], RawContract::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(contracts.len());
        for raw in contracts {
          let versions = load_versions(conn, &raw.contract_id)?;
          let recipients = load_recipients(conn, &raw.contract_id)?;
          out.push((raw, versions, recipients));
        }
        Ok(out)
      })
      .await?;

    raws.into_iter().map(into_contract).collect()
  }

  async fn activate_version(&self, contract_id: Uuid, version_number: u32) -> Result<Option<Contract>> {
    let id_str     = encode_uuid(contract_id);
    let active_str = encode_contract_status(ContractStatus::Active);
    let at_str     = encode_dt(Utc::now());

    // One statement, so an append committing between the storage probe and
    // this write leaves the row untouched.
    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE contracts SET status = ?2, updated_at = ?3
           WHERE contract_id = ?1
             AND (SELECT MAX(version_number) FROM contract_versions
                  WHERE contract_id = ?1) = ?4",
          rusqlite::params![id_str, active_str, at_str, version_number],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(load_aggregate(conn, &id_str)?)
      })
      .await?;

    raw.map(into_contract).transpose()
  }

  // ── Versions ──────────────────────────────────────────────────────────────

  async fn append_version(
    &self,
    contract_id: Uuid,
    draft: VersionDraft,
  ) -> Result<Option<ContractVersion>> {
    let now         = Utc::now();
    let version_id  = Uuid::new_v4();
    let id_str      = encode_uuid(contract_id);
    let version_str = encode_uuid(version_id);
    let at_str      = encode_dt(now);
    let pending     = encode_contract_status(ContractStatus::PendingUpload);
    let object_key  = draft.object_key.clone();
    let content     = draft.content_type.clone();
    let size        = draft.size_hint.map(|s| s as i64);

    // IMMEDIATE takes the write lock before reading MAX, so two appends to
    // the same contract cannot both observe the same maximum.
    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM contracts WHERE contract_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let next: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version_number), 0) + 1
           FROM contract_versions WHERE contract_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO contract_versions (
             version_id, contract_id, version_number, object_key,
             content_type, size_hint, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![version_str, id_str, next, object_key, content, size, at_str],
        )?;
        tx.execute(
          "UPDATE contracts SET status = ?2, updated_at = ?3 WHERE contract_id = ?1",
          rusqlite::params![id_str, pending, at_str],
        )?;
        tx.commit()?;
        Ok(Some(next))
      })
      .await
      .map_err(Error::from);

    let next = match result {
      Ok(Some(n)) => crate::encode::decode_version_number(n)?,
      Ok(None) => return Ok(None),
      Err(e) if e.is_constraint_violation() => {
        let latest = self.latest_version(contract_id).await?;
        return Err(Error::VersionConflict {
          contract_id,
          version_number: latest.map_or(1, |v| v.version_number + 1),
        });
      }
      Err(e) => return Err(e),
    };

    Ok(Some(ContractVersion {
      version_id,
      contract_id,
      version_number: next,
      object_key: draft.object_key,
      content_type: draft.content_type,
      size_hint: draft.size_hint,
      created_at: now,
    }))
  }

  async fn latest_version(&self, contract_id: Uuid) -> Result<Option<ContractVersion>> {
    let id_str = encode_uuid(contract_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VERSION_COLUMNS} FROM contract_versions
                 WHERE contract_id = ?1
                 ORDER BY version_number DESC
                 LIMIT 1"
              ),
              rusqlite::params![id_str],
              RawVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVersion::into_version).transpose()
  }

  async fn get_version(
    &self,
    contract_id: Uuid,
    version_number: u32,
  ) -> Result<Option<ContractVersion>> {
    let id_str = encode_uuid(contract_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VERSION_COLUMNS} FROM contract_versions
                 WHERE contract_id = ?1 AND version_number = ?2"
              ),
              rusqlite::params![id_str, i64::from(version_number)],
              RawVersion::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVersion::into_version).transpose()
  }

  // ── Recipients ────────────────────────────────────────────────────────────

  async fn replace_recipients(
    &self,
    contract_id: Uuid,
    emails: Vec<String>,
  ) -> Result<Vec<ContractRecipient>> {
    let id_str  = encode_uuid(contract_id);
    let pending = encode_recipient_status(RecipientStatus::Pending);
    let rows    = emails.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM contract_recipients WHERE contract_id = ?1",
          rusqlite::params![id_str],
        )?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO contract_recipients (contract_id, email, status, signed_at)
             VALUES (?1, ?2, ?3, NULL)",
          )?;
          for email in &rows {
            insert.execute(rusqlite::params![id_str, email, pending])?;
          }
        }
        // Dropping `tx` without commit rolls back on any early return above.
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(
      emails
        .into_iter()
        .map(|email| ContractRecipient {
          contract_id,
          email,
          status: RecipientStatus::Pending,
          signed_at: None,
        })
        .collect(),
    )
  }

  async fn get_recipient(&self, contract_id: Uuid, email: &str) -> Result<Option<ContractRecipient>> {
    let id_str = encode_uuid(contract_id);
    let email  = email.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECIPIENT_COLUMNS} FROM contract_recipients
                 WHERE contract_id = ?1 AND email = ?2"
              ),
              rusqlite::params![id_str, email],
              RawRecipient::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecipient::into_recipient).transpose()
  }

  async fn mark_signed(&self, contract_id: Uuid, email: &str) -> Result<Option<ContractRecipient>> {
    let id_str  = encode_uuid(contract_id);
    let email   = email.to_owned();
    let signed  = encode_recipient_status(RecipientStatus::Signed);
    let pending = encode_recipient_status(RecipientStatus::Pending);
    let at_str  = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Only a pending row moves; a signed row keeps its first timestamp.
        tx.execute(
          "UPDATE contract_recipients SET status = ?3, signed_at = ?4
           WHERE contract_id = ?1 AND email = ?2 AND status = ?5",
          rusqlite::params![id_str, email, signed, at_str, pending],
        )?;
        let row = tx
          .query_row(
            &format!(
              "SELECT {RECIPIENT_COLUMNS} FROM contract_recipients
               WHERE contract_id = ?1 AND email = ?2"
            ),
            rusqlite::params![id_str, email],
            RawRecipient::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.map(RawRecipient::into_recipient).transpose()
  }

  // ── Chat ──────────────────────────────────────────────────────────────────

  async fn open_chat_session(&self, contract_id: Uuid, user_id: &str) -> Result<ChatSession> {
    let session = ChatSession {
      session_id: Uuid::new_v4(),
      contract_id,
      user_id: user_id.to_owned(),
      created_at: Utc::now(),
    };

    let session_str  = encode_uuid(session.session_id);
    let contract_str = encode_uuid(contract_id);
    let user         = session.user_id.clone();
    let at_str       = encode_dt(session.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO chat_sessions (session_id, contract_id, user_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![session_str, contract_str, user, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn append_chat_message(
    &self,
    session_id: Uuid,
    role: ChatRole,
    content: String,
  ) -> Result<ChatMessage> {
    let now         = Utc::now();
    let message_id  = Uuid::new_v4();
    let session_str = encode_uuid(session_id);
    let message_str = encode_uuid(message_id);
    let role_str    = encode_chat_role(role);
    let at_str      = encode_dt(now);
    let body        = content.clone();

    let sequence = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM chat_sessions WHERE session_id = ?1",
            rusqlite::params![session_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }
        let next: i64 = tx.query_row(
          "SELECT COALESCE(MAX(sequence), 0) + 1 FROM chat_messages WHERE session_id = ?1",
          rusqlite::params![session_str],
          |r| r.get(0),
        )?;
        tx.execute(
          "INSERT INTO chat_messages (message_id, session_id, sequence, role, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![message_str, session_str, next, role_str, body, at_str],
        )?;
        tx.commit()?;
        Ok(Some(next))
      })
      .await?
      .ok_or(Error::SessionNotFound(session_id))?;

    Ok(ChatMessage {
      message_id,
      session_id,
      sequence: crate::encode::decode_version_number(sequence)?,
      role,
      content,
      created_at: now,
    })
  }

  async fn chat_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
    let session_str = encode_uuid(session_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT message_id, session_id, sequence, role, content, created_at
           FROM chat_messages
           WHERE session_id = ?1
           ORDER BY sequence ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![session_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}
