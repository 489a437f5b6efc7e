//! Chat sessions scoped to one contract and one caller.
//!
//! Persistence only: the question bridge does not record conversations, so
//! these records are written and read by store backends and their tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  User,
  Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
  pub session_id:  Uuid,
  pub contract_id: Uuid,
  pub user_id:     String,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub message_id: Uuid,
  pub session_id: Uuid,
  /// Position within the session, starting at 1.
  pub sequence:   u32,
  pub role:       ChatRole,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}
