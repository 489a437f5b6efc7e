//! The `ObjectStorage` trait: an S3-compatible capability-URL issuer.
//!
//! The service never moves file bytes. It asks the gateway for a URL that
//! lets the holder perform exactly one operation on one object until the URL
//! expires. Such URLs are bearer credentials and must never be logged.

use std::{future::Future, time::Duration};

/// The HTTP verb a capability URL is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Put,
  Get,
}

impl Access {
  pub fn method(self) -> &'static str {
    match self {
      Self::Put => "PUT",
      Self::Get => "GET",
    }
  }
}

pub trait ObjectStorage: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Create the bucket if it does not exist. An "already exists" outcome is
  /// success.
  fn ensure_bucket<'a>(
    &'a self,
    bucket: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Issue a URL that allows one `access` operation on `bucket/key` until
  /// `ttl` has elapsed.
  fn presign<'a>(
    &'a self,
    access: Access,
    bucket: &'a str,
    key: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Whether an object is present at `bucket/key`.
  fn object_exists<'a>(
    &'a self,
    bucket: &'a str,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
