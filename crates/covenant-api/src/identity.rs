//! Bearer-token identity extraction.
//!
//! Tokens are HS256 JWTs issued by the auth service. A token that fails any
//! check yields no identity rather than an error; whether an identity is
//! required is decided by the service layer.

use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::{FromRef, FromRequestParts},
  http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use covenant_core::caller::Caller;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ─── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
  /// Shared HS256 secret of the auth service.
  pub secret:     String,
  /// When set, tokens must carry a matching `project_id` claim.
  #[serde(default)]
  pub project_id: Option<String>,
  /// When set, tokens must carry a matching `iss` claim.
  #[serde(default)]
  pub issuer:     Option<String>,
}

// ─── Claims ───────────────────────────────────────────────────────────────────

/// Claims as minted by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub:              String,
  pub exp:              i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iss:              Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:             Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:            Option<String>,
  #[serde(default)]
  pub email_verified:   bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_id:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub selected_team_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role:             Option<String>,
  #[serde(default)]
  pub is_anonymous:     bool,
}

/// A verified, non-anonymous identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub subject:        String,
  pub name:           Option<String>,
  pub email:          Option<String>,
  pub email_verified: bool,
  pub team_id:        Option<String>,
  pub role:           Option<String>,
}

impl Identity {
  /// The caller as the service sees it. Unverified emails are dropped, so
  /// they can never match a recipient.
  pub fn caller(&self) -> Caller {
    let email = self.email.as_deref().filter(|_| self.email_verified);
    Caller::new(self.subject.clone(), email)
  }
}

#[derive(Debug, Error)]
pub enum TokenError {
  #[error(transparent)]
  Jwt(#[from] jsonwebtoken::errors::Error),

  #[error("token belongs to another project")]
  ProjectMismatch,

  #[error("anonymous token")]
  Anonymous,
}

// ─── Verifier ─────────────────────────────────────────────────────────────────

pub struct TokenVerifier {
  key:        DecodingKey,
  validation: Validation,
  project_id: Option<String>,
}

impl TokenVerifier {
  pub fn new(settings: &AuthSettings) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.validate_nbf = true;
    // Audience is not part of the contract with the auth service.
    validation.validate_aud = false;
    if let Some(issuer) = &settings.issuer {
      validation.set_required_spec_claims(&["exp", "sub", "iss"]);
      validation.set_issuer(&[issuer]);
    }
    Self {
      key: DecodingKey::from_secret(settings.secret.as_bytes()),
      validation,
      project_id: settings.project_id.clone(),
    }
  }

  pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
    let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;

    if let Some(expected) = &self.project_id
      && claims.project_id.as_deref() != Some(expected.as_str())
    {
      return Err(TokenError::ProjectMismatch);
    }
    if claims.is_anonymous {
      return Err(TokenError::Anonymous);
    }

    Ok(Identity {
      subject:        claims.sub,
      name:           claims.name,
      email:          claims.email,
      email_verified: claims.email_verified,
      team_id:        claims.selected_team_id,
      role:           claims.role,
    })
  }

  /// Resolve the identity carried by `Authorization: Bearer <token>`, if any.
  pub fn identify(&self, headers: &HeaderMap) -> Option<Identity> {
    let token = headers
      .get(AUTHORIZATION)
      .and_then(|v| v.to_str().ok())?
      .strip_prefix("Bearer ")?
      .trim();

    match self.verify(token) {
      Ok(identity) => Some(identity),
      Err(e) => {
        debug!(error = %e, "ignoring bearer token");
        None
      }
    }
  }
}

// ─── Extractor ────────────────────────────────────────────────────────────────

/// The request's identity, absent when no valid token was presented.
pub struct MaybeIdentity(pub Option<Identity>);

impl MaybeIdentity {
  pub fn caller(&self) -> Option<Caller> { self.0.as_ref().map(Identity::caller) }
}

impl<St> FromRequestParts<St> for MaybeIdentity
where
  Arc<TokenVerifier>: FromRef<St>,
  St: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let verifier = Arc::<TokenVerifier>::from_ref(state);
    Ok(MaybeIdentity(verifier.identify(&parts.headers)))
  }
}
