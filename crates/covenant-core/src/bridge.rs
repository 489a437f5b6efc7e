//! [`QuestionBridge`]: forwards a question about a contract's latest file
//! to the answering agent and relays the answer untouched.
//!
//! One synchronous hop: resolve the latest version, mint a short-lived read
//! URL, call the agent once. Nothing is persisted.

use std::{sync::Arc, time::Duration};

use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  agent::{AgentRequest, AnswerAgent},
  caller::Caller,
  service::LifecycleService,
  storage::ObjectStorage,
  store::ContractStore,
};

pub struct QuestionBridge<S, G, A> {
  lifecycle: Arc<LifecycleService<S, G>>,
  agent:     Arc<A>,
  read_ttl:  Duration,
}

impl<S, G, A> QuestionBridge<S, G, A>
where
  S: ContractStore,
  G: ObjectStorage,
  A: AnswerAgent,
{
  /// `read_ttl` bounds how long the agent may fetch the file (one hour by
  /// default in the server).
  pub fn new(lifecycle: Arc<LifecycleService<S, G>>, agent: Arc<A>, read_ttl: Duration) -> Self {
    Self { lifecycle, agent, read_ttl }
  }

  pub async fn ask(
    &self,
    contract_id: Uuid,
    question: &str,
    caller: Option<&Caller>,
  ) -> Result<String> {
    let caller = caller.ok_or(Error::Unauthenticated)?;
    let question = question.trim();
    if question.is_empty() {
      return Err(Error::invalid("question is required"));
    }

    let (_, latest) = self.lifecycle.readable_latest(contract_id, Some(caller)).await?;
    let file_url = self.lifecycle.presign_read(&latest, self.read_ttl).await?;

    let request = AgentRequest {
      contract_id,
      question: question.to_string(),
      file_url,
    };
    let answer = self.agent.ask(&request).await.map_err(Error::from_backend)?;

    info!(
      contract_id = %contract_id,
      version = latest.version_number,
      answer_len = answer.len(),
      "question answered"
    );
    Ok(answer)
  }
}
