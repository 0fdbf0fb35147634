//! Account persistence abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for token values that prevents accidental logging
//! - [`AccountStore`] - Trait for account storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileStore`] - JSON-file implementation for single-node deployments
//!
//! The store is the only component that touches persisted account state.
//! It provides atomic single-record reads and updates; no multi-record
//! transactions are offered or required. A relational backend slots in
//! behind the same trait without touching any other component.
//!
//! # Example
//!
//! ```rust,ignore
//! use stridelink_core::store::{AccountStore, MemoryStore};
//! use stridelink_core::{Profile, SubjectId};
//!
//! let store = MemoryStore::new();
//! let subject = SubjectId::new("u1");
//! store.upsert_profile(&subject, Profile {
//!     email: "u1@example.com".into(),
//!     display_name: "User One".into(),
//!     avatar_url: None,
//! }).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Account, DelegatedCredential, Profile, SubjectId};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for account store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No account exists for the subject; credential attachment is an
    /// update, never an insert.
    #[error("account not found for subject {subject}")]
    AccountNotFound { subject: String },

    /// I/O error reading or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Platform data directory not available.
    #[error("data directory not available")]
    DataDirUnavailable,

    /// Internal lock poisoning error.
    #[error("internal lock error: {message}")]
    LockPoisoned { message: String },
}

/// Abstraction over account storage backends.
///
/// Implementations must provide atomic single-record reads and updates
/// and be safe to call concurrently across distinct subjects.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by subject identifier.
    ///
    /// Returns `Ok(None)` if no account exists for the subject.
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Account>, StoreError>;

    /// Create the account for a subject on first login, or return the
    /// existing account unchanged.
    ///
    /// Profile fields are set once at creation; a repeat login for the
    /// same subject is a no-op on them.
    async fn upsert_profile(
        &self,
        subject: &SubjectId,
        profile: Profile,
    ) -> Result<Account, StoreError>;

    /// Attach or replace the delegated credential on an existing account.
    ///
    /// Fails with [`StoreError::AccountNotFound`] if the account does not
    /// exist. Never touches profile fields.
    async fn upsert_credential(
        &self,
        subject: &SubjectId,
        credential: DelegatedCredential,
    ) -> Result<(), StoreError>;

    /// List all stored accounts.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_expose_roundtrip() {
        let secret = Secret::new("value");
        assert_eq!(secret.expose(), "value");
        assert_eq!(secret.into_inner(), "value");
    }
}
