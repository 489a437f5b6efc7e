//! Error type for `covenant-objects`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid storage endpoint {0:?}")]
  InvalidEndpoint(String),

  #[error("presign ttl must be between 1 second and 7 days, got {0:?}")]
  InvalidTtl(Duration),

  /// An SDK call failed, in transport or at the service.
  #[error("{operation} failed: {message}")]
  S3 {
    operation: &'static str,
    message:   String,
  },

  #[error("{operation} returned unexpected status {status}")]
  UnexpectedStatus {
    operation: &'static str,
    status:    u16,
  },

  /// A capability URL was malformed, tampered with, or bound to another verb.
  #[error("invalid capability url: {0}")]
  InvalidCapability(String),

  #[error("capability url has expired")]
  Expired,

  /// Failure injected into [`crate::MemoryGateway`].
  #[error("injected failure: {0}")]
  Injected(String),
}

impl From<Error> for covenant_core::Error {
  fn from(err: Error) -> Self { covenant_core::Error::Internal(err.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
