//! Error taxonomy shared by every Covenant crate.
//!
//! Backend crates define their own error enums and convert them into this one
//! (`impl From<backend::Error> for covenant_core::Error`); the HTTP layer maps
//! each variant onto exactly one status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("no usable identity")]
  Unauthenticated,

  #[error("caller may not access this contract")]
  PermissionDenied,

  #[error("{0} not found")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("failed precondition: {0}")]
  FailedPrecondition(String),

  #[error("upstream unavailable: {0}")]
  UpstreamUnavailable(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }

  pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidArgument(msg.into()) }

  /// Convert a collaborator's error into the shared taxonomy.
  pub fn from_backend<E: Into<Error>>(err: E) -> Self { err.into() }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
