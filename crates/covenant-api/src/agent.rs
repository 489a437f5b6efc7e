//! HTTP client for the answering agent.

use std::time::Duration;

use covenant_core::agent::{AgentRequest, AnswerAgent};
use reqwest::Client;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_AGENT_ENDPOINT: &str = "http://ai-agent:3000/ask";

/// The call did not complete: connection refused, timeout, or the body
/// could not be read.
#[derive(Debug, Error)]
#[error("agent request failed: {0}")]
pub struct AgentError(#[from] reqwest::Error);

impl From<AgentError> for covenant_core::Error {
  fn from(err: AgentError) -> Self { covenant_core::Error::UpstreamUnavailable(err.to_string()) }
}

/// Posts questions to a single endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpAgent {
  client:   Client,
  endpoint: String,
}

impl HttpAgent {
  pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint: endpoint.into() })
  }
}

impl AnswerAgent for HttpAgent {
  type Error = AgentError;

  /// Any completed exchange is relayed, whatever its status.
  async fn ask(&self, request: &AgentRequest) -> Result<String, AgentError> {
    let resp = self.client.post(&self.endpoint).json(request).send().await?;
    let status = resp.status();
    if !status.is_success() {
      warn!(status = status.as_u16(), contract_id = %request.contract_id, "agent answered with an error status");
    }
    Ok(resp.text().await?)
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode, routing::post};
  use serde_json::{Value, json};
  use tokio::net::TcpListener;
  use uuid::Uuid;

  use super::*;

  async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/ask")
  }

  fn request() -> AgentRequest {
    AgentRequest {
      contract_id: Uuid::new_v4(),
      question:    "Who pays rent?".into(),
      file_url:    "http://minio:9000/contracts/k.pdf".into(),
    }
  }

  #[tokio::test]
  async fn posts_the_payload_and_returns_the_body_verbatim() {
    let endpoint = serve(Router::new().route(
      "/ask",
      post(|Json(body): Json<Value>| async move {
        format!(r#"{{"echo": {}, "keys": {}}}"#, body["question"], body.as_object().map_or(0, |o| o.len()))
      }),
    ))
    .await;

    let agent = HttpAgent::new(endpoint, Duration::from_secs(5)).unwrap();
    let body = agent.ask(&request()).await.unwrap();
    assert_eq!(body, r#"{"echo": "Who pays rent?", "keys": 3}"#);
  }

  #[tokio::test]
  async fn error_statuses_are_relayed_not_failed() {
    let endpoint = serve(Router::new().route(
      "/ask",
      post(|| async {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "Question is required" })))
      }),
    ))
    .await;

    let agent = HttpAgent::new(endpoint, Duration::from_secs(5)).unwrap();
    let body = agent.ask(&request()).await.unwrap();
    assert_eq!(
      serde_json::from_str::<Value>(&body).unwrap(),
      json!({ "error": "Question is required" })
    );
  }

  #[tokio::test]
  async fn unreachable_agent_is_upstream_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let agent = HttpAgent::new(format!("http://{addr}/ask"), Duration::from_secs(2)).unwrap();
    let err = agent.ask(&request()).await.unwrap_err();
    assert!(matches!(
      covenant_core::Error::from(err),
      covenant_core::Error::UpstreamUnavailable(_)
    ));
  }

  #[tokio::test]
  async fn slow_agent_hits_the_timeout() {
    let endpoint = serve(Router::new().route(
      "/ask",
      post(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "too late"
      }),
    ))
    .await;

    let agent = HttpAgent::new(endpoint, Duration::from_millis(100)).unwrap();
    let err = agent.ask(&request()).await.unwrap_err();
    assert!(err.0.is_timeout());
  }
}
