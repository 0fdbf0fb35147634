//! Identity assertion verification.
//!
//! This module provides:
//! - [`VerifiedIdentity`] - The subject and profile extracted from an assertion
//! - [`IdentityVerifier`] - Trait for assertion verification backends
//! - [`JwtVerifier`] - Signed-JWT implementation
//!
//! The verifier consumes the opaque bearer credential from an
//! `Authorization: Bearer <token>` header and either produces a stable
//! subject identifier plus profile fields, or fails. Session mechanics
//! beyond validating an already-issued assertion are out of scope.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Profile, SubjectId};

/// Error type for identity verification.
///
/// Always maps to HTTP 401 at the API boundary and is never retried
/// server-side.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The assertion is missing, malformed, expired, or carries a bad
    /// signature.
    #[error("invalid identity assertion: {message}")]
    Invalid { message: String },

    /// The assertion verified but lacks a required claim.
    #[error("identity assertion missing claim: {claim}")]
    MissingClaim { claim: &'static str },
}

/// The outcome of a successful identity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stable subject identifier assigned by the identity provider.
    pub subject: SubjectId,

    /// Email address claim.
    pub email: String,

    /// Display name claim.
    pub display_name: String,

    /// Avatar URL claim, if present.
    pub avatar_url: Option<String>,
}

impl VerifiedIdentity {
    /// The profile mirror recorded at first login.
    pub fn profile(&self) -> Profile {
        Profile {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Abstraction over identity assertion verification.
///
/// The production identity provider's key-set verification and the
/// shared-secret [`JwtVerifier`] both sit behind this seam; components
/// take the trait so tests can substitute a canned verifier.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a bearer assertion and extract the identity it carries.
    async fn verify(&self, bearer: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Claims carried by the identity provider's signed token.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    exp: i64,
    #[serde(default)]
    iss: Option<String>,
}

/// Verifier for HMAC-signed identity tokens.
///
/// Validates the signature and expiry, optionally pins the issuer, and
/// extracts the `sub`, `email`, `name`, and `picture` claims.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier over a shared HMAC secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Require the given issuer on every assertion.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.validation.set_issuer(&[issuer.into()]);
        self
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, bearer: &str) -> Result<VerifiedIdentity, IdentityError> {
        let token_data = decode::<IdentityClaims>(bearer, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("identity assertion rejected: {}", e);
                IdentityError::Invalid {
                    message: e.to_string(),
                }
            })?;

        let claims = token_data.claims;

        if claims.sub.is_empty() {
            return Err(IdentityError::MissingClaim { claim: "sub" });
        }

        let email = claims
            .email
            .ok_or(IdentityError::MissingClaim { claim: "email" })?;
        let display_name = claims
            .name
            .ok_or(IdentityError::MissingClaim { claim: "name" })?;

        Ok(VerifiedIdentity {
            subject: SubjectId::new(claims.sub),
            email,
            display_name,
            avatar_url: claims.picture,
        })
    }
}
