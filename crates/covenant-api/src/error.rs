//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use covenant_core::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Service(#[from] Error),

  /// The request could not be decoded (body or path).
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Service(e) => match e {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::Unauthenticated => StatusCode::UNAUTHORIZED,
        Error::PermissionDenied => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) | Error::FailedPrecondition(_) => StatusCode::CONFLICT,
        Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::BadRequest(m) => m.clone(),
      ApiError::Service(Error::Internal(detail)) => {
        error!(%detail, "request failed");
        "internal server error".to_string()
      }
      ApiError::Service(Error::UpstreamUnavailable(detail)) => {
        error!(%detail, "answering agent unavailable");
        "answering agent unavailable".to_string()
      }
      ApiError::Service(e) => e.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
