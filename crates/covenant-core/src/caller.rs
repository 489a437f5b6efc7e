//! The verified caller identity as seen by the service layer.

use crate::{
  contract::Contract,
  recipient::normalise_email,
};

/// A verified caller. Only built from a credential whose signature has been
/// checked; `email` is only set when the issuer marked it verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub subject: String,
  pub email:   Option<String>,
}

impl Caller {
  pub fn new(subject: impl Into<String>, email: Option<&str>) -> Self {
    Self {
      subject: subject.into(),
      email:   email.map(normalise_email).filter(|e| !e.is_empty()),
    }
  }

  pub fn is_author_of(&self, contract: &Contract) -> bool {
    contract.author_id == self.subject
  }

  pub fn is_recipient_of(&self, contract: &Contract) -> bool {
    self
      .email
      .as_deref()
      .is_some_and(|email| contract.has_recipient(email))
  }

  /// Authors and listed recipients may read a contract's files.
  pub fn can_read(&self, contract: &Contract) -> bool {
    self.is_author_of(contract) || self.is_recipient_of(contract)
  }
}
