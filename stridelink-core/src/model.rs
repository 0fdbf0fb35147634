//! Domain model types for Stridelink.
//!
//! This module defines the core types used throughout Stridelink:
//! - [`SubjectId`] - Stable identifier assigned by the identity provider
//! - [`Profile`] - Profile fields mirrored from the identity assertion
//! - [`DelegatedCredential`] - The token set a user's consent grants us
//! - [`Account`] - Full account record, one per end-user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Secret;

/// Stable identifier for an authenticated user, assigned by the
/// identity provider.
///
/// # Examples
///
/// ```
/// use stridelink_core::SubjectId;
///
/// let subject = SubjectId::new("u-8f3a2c");
/// assert_eq!(subject.as_str(), "u-8f3a2c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a new subject ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the subject ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Profile fields mirrored from the identity provider at first login.
///
/// These are set once when the account is created and not synchronized
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Email address reported by the identity provider.
    pub email: String,

    /// Display name reported by the identity provider.
    pub display_name: String,

    /// Avatar URL, if the identity provider supplied one.
    pub avatar_url: Option<String>,
}

/// The delegated access/refresh token pair a user's consent grants us
/// for calling the activity provider on their behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatedCredential {
    /// Short-lived access token for the provider's API.
    pub access_token: Secret,

    /// Long-lived refresh token used to obtain new access tokens.
    pub refresh_token: Secret,

    /// Absolute expiry of the access token, unix epoch seconds.
    ///
    /// Always the provider-declared absolute expiry, never a duration.
    pub expires_at: i64,

    /// The provider-side account identifier (athlete id), if known.
    pub provider_account_id: Option<i64>,
}

impl DelegatedCredential {
    /// Check whether the access token is expired at the given instant.
    ///
    /// Expiry is exclusive of the current moment: a token whose expiry
    /// equals `now` is already expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Check whether the access token is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Full account record, one per end-user.
///
/// An account is created on first successful identity verification and
/// only later gains a [`DelegatedCredential`] through the authorization
/// flow. Credential attachment is always an update, never an insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The identity provider's stable subject identifier.
    pub subject: SubjectId,

    /// Profile mirror from the identity assertion.
    pub profile: Profile,

    /// Delegated credential, absent until the user completes the
    /// authorization flow. At most one per account; a later
    /// authorization overwrites the former.
    pub credential: Option<DelegatedCredential>,

    /// When the account was first created.
    pub created_at: DateTime<Utc>,

    /// When a delegated credential was last attached or refreshed.
    pub linked_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account with the current timestamp and no credential.
    pub fn new(subject: SubjectId, profile: Profile) -> Self {
        Self {
            subject,
            profile,
            credential: None,
            created_at: Utc::now(),
            linked_at: None,
        }
    }

    /// Whether this account has a delegated credential attached.
    pub fn is_linked(&self) -> bool {
        self.credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: i64) -> DelegatedCredential {
        DelegatedCredential {
            access_token: Secret::new("access"),
            refresh_token: Secret::new("refresh"),
            expires_at,
            provider_account_id: None,
        }
    }

    #[test]
    fn test_expiry_is_exclusive_of_now() {
        let cred = credential(1000);
        assert!(cred.is_expired_at(1001));
        assert!(cred.is_expired_at(1000));
        assert!(!cred.is_expired_at(999));
    }

    #[test]
    fn test_new_account_is_not_linked() {
        let account = Account::new(
            SubjectId::new("u1"),
            Profile {
                email: "u1@example.com".to_string(),
                display_name: "User One".to_string(),
                avatar_url: None,
            },
        );
        assert!(!account.is_linked());
        assert!(account.linked_at.is_none());
    }
}
