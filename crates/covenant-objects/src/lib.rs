//! Object-storage gateways for Covenant.
//!
//! [`S3Gateway`] talks to any S3-compatible service (MinIO, AWS S3) through
//! the AWS SDK and issues its presigned URLs. [`MemoryGateway`] is an
//! in-process stand-in that issues and verifies its own capability URLs, for
//! tests and local development.
//!
//! Presigned URLs are bearer credentials. Nothing in this crate logs them.

mod memory;
mod s3;

pub mod error;

pub use error::{Error, Result};
pub use memory::{CallCounts, MemoryGateway};
pub use s3::{S3Config, S3Gateway};
