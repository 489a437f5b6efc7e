//! Error type for `covenant-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),

  /// Another writer claimed the same version number or object key first.
  #[error("version {version_number} of contract {contract_id} was claimed concurrently")]
  VersionConflict {
    contract_id:    Uuid,
    version_number: u32,
  },

  #[error("chat session not found: {0}")]
  SessionNotFound(Uuid),
}

impl Error {
  /// Whether the underlying SQLite failure was a constraint violation
  /// (UNIQUE, CHECK, FOREIGN KEY or a RAISE(ABORT) trigger).
  pub fn is_constraint_violation(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) => {
        e.code == rusqlite::ErrorCode::ConstraintViolation
      }
      _ => false,
    }
  }
}

impl From<Error> for covenant_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::VersionConflict { .. } => covenant_core::Error::Conflict(err.to_string()),
      Error::SessionNotFound(id) => covenant_core::Error::NotFound(format!("chat session {id}")),
      other => covenant_core::Error::Internal(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
