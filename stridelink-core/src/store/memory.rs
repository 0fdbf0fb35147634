//! In-memory account storage implementation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{AccountStore, StoreError};
use crate::model::{Account, DelegatedCredential, Profile, SubjectId};

/// In-memory account store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryStore {
    accounts: RwLock<HashMap<SubjectId, Account>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.accounts.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("MemoryStore")
            .field("accounts_count", &count)
            .finish()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|e| StoreError::LockPoisoned {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(accounts.get(subject).cloned())
    }

    async fn upsert_profile(
        &self,
        subject: &SubjectId,
        profile: Profile,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().map_err(|e| StoreError::LockPoisoned {
            message: format!("write lock poisoned: {}", e),
        })?;

        let account = accounts
            .entry(subject.clone())
            .or_insert_with(|| Account::new(subject.clone(), profile));

        Ok(account.clone())
    }

    async fn upsert_credential(
        &self,
        subject: &SubjectId,
        credential: DelegatedCredential,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|e| StoreError::LockPoisoned {
            message: format!("write lock poisoned: {}", e),
        })?;

        let account = accounts
            .get_mut(subject)
            .ok_or_else(|| StoreError::AccountNotFound {
                subject: subject.to_string(),
            })?;

        account.credential = Some(credential);
        account.linked_at = Some(Utc::now());

        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|e| StoreError::LockPoisoned {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(accounts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;

    fn test_profile() -> Profile {
        Profile {
            email: "u1@example.com".to_string(),
            display_name: "User One".to_string(),
            avatar_url: Some("https://example.com/u1.png".to_string()),
        }
    }

    fn test_credential() -> DelegatedCredential {
        DelegatedCredential {
            access_token: Secret::new("access"),
            refresh_token: Secret::new("refresh"),
            expires_at: 2_000_000_000,
            provider_account_id: Some(42),
        }
    }

    #[tokio::test]
    async fn test_find_nonexistent() {
        let store = MemoryStore::new();
        let result = store.find_by_subject(&SubjectId::new("u1")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_upsert_profile_creates_account() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1");

        store.upsert_profile(&subject, test_profile()).await.unwrap();

        let account = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert_eq!(account.profile.email, "u1@example.com");
        assert!(!account.is_linked());
    }

    #[tokio::test]
    async fn test_repeat_login_is_noop_on_profile() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1");

        store.upsert_profile(&subject, test_profile()).await.unwrap();

        let changed = Profile {
            email: "other@example.com".to_string(),
            display_name: "Other".to_string(),
            avatar_url: None,
        };
        store.upsert_profile(&subject, changed).await.unwrap();

        let account = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert_eq!(account.profile.email, "u1@example.com");
        assert_eq!(account.profile.display_name, "User One");
    }

    #[tokio::test]
    async fn test_upsert_credential_requires_account() {
        let store = MemoryStore::new();
        let result = store
            .upsert_credential(&SubjectId::new("ghost"), test_credential())
            .await;
        assert!(matches!(result, Err(StoreError::AccountNotFound { .. })));
    }

    #[tokio::test]
    async fn test_upsert_credential_attaches_and_overwrites() {
        let store = MemoryStore::new();
        let subject = SubjectId::new("u1");
        store.upsert_profile(&subject, test_profile()).await.unwrap();

        store
            .upsert_credential(&subject, test_credential())
            .await
            .unwrap();

        let account = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert!(account.is_linked());
        assert!(account.linked_at.is_some());

        // A later authorization overwrites the former credential.
        let replacement = DelegatedCredential {
            access_token: Secret::new("access2"),
            refresh_token: Secret::new("refresh2"),
            expires_at: 2_100_000_000,
            provider_account_id: Some(42),
        };
        store
            .upsert_credential(&subject, replacement.clone())
            .await
            .unwrap();

        let account = store.find_by_subject(&subject).await.unwrap().unwrap();
        assert_eq!(account.credential.unwrap(), replacement);
    }
}
