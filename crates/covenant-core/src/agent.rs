//! The `AnswerAgent` trait: the downstream question-answering service.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

/// Payload forwarded to the agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
  pub contract_id: Uuid,
  pub question:    String,
  /// Time-boxed read URL for the contract's latest file.
  pub file_url:    String,
}

pub trait AnswerAgent: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Forward one request and return the raw response body, unmodified.
  fn ask<'a>(
    &'a self,
    request: &'a AgentRequest,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}
