//! JSON-file account storage implementation.
//!
//! Accounts are stored as a single versioned JSON document with an
//! in-memory cache and write-through saves. Suitable for single-node
//! deployments; a relational backend implements the same trait for
//! anything larger.
//!
//! # Storage Location
//!
//! The default path is `accounts.json` under the platform data directory
//! (`~/.local/share/stridelink` on Linux, the equivalent elsewhere).

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use super::{AccountStore, StoreError};
use crate::model::{Account, DelegatedCredential, Profile, SubjectId};

/// Internal storage format for accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileStoreData {
    /// Version of the store format (for future migrations).
    version: u32,

    /// All stored accounts.
    accounts: Vec<Account>,
}

impl Default for FileStoreData {
    fn default() -> Self {
        Self {
            version: 1,
            accounts: Vec::new(),
        }
    }
}

/// Disk-backed account store.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock`; safe to share across threads
/// via `Arc`. Record updates happen under the write lock, so each
/// subject's read-modify-write is atomic with respect to other callers.
pub struct FileStore {
    /// Path to the accounts JSON file.
    path: PathBuf,

    /// In-memory cache of account data.
    data: RwLock<FileStoreData>,
}

impl FileStore {
    /// Get the default storage path for accounts.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = directories::ProjectDirs::from("io", "stridelink", "stridelink")
            .ok_or(StoreError::DataDirUnavailable)?;
        Ok(dirs.data_dir().join("accounts.json"))
    }

    /// Load the account store from the default location.
    ///
    /// Creates the file and parent directories if they don't exist.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from_path(Self::default_path()?)
    }

    /// Load the account store from a specific path.
    ///
    /// Creates the file and parent directories if they don't exist.
    pub fn load_from_path(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            FileStoreData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Get the storage path for this store.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Save the current state to disk.
    fn save(&self) -> Result<(), StoreError> {
        let data = self.data.read().map_err(|e| StoreError::LockPoisoned {
            message: format!("read lock poisoned: {}", e),
        })?;

        let contents = serde_json::to_string_pretty(&*data)?;
        fs::write(&self.path, contents)?;

        Ok(())
    }
}

#[async_trait]
impl AccountStore for FileStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Account>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::LockPoisoned {
            message: format!("read lock poisoned: {}", e),
        })?;

        Ok(data
            .accounts
            .iter()
            .find(|a| &a.subject == subject)
            .cloned())
    }

    async fn upsert_profile(
        &self,
        subject: &SubjectId,
        profile: Profile,
    ) -> Result<Account, StoreError> {
        let account = {
            let mut data = self.data.write().map_err(|e| StoreError::LockPoisoned {
                message: format!("write lock poisoned: {}", e),
            })?;

            if let Some(existing) = data.accounts.iter().find(|a| &a.subject == subject) {
                // Repeat login: profile fields are set once, never re-written.
                return Ok(existing.clone());
            }

            let account = Account::new(subject.clone(), profile);
            data.accounts.push(account.clone());
            account
        };

        self.save()?;
        Ok(account)
    }

    async fn upsert_credential(
        &self,
        subject: &SubjectId,
        credential: DelegatedCredential,
    ) -> Result<(), StoreError> {
        {
            let mut data = self.data.write().map_err(|e| StoreError::LockPoisoned {
                message: format!("write lock poisoned: {}", e),
            })?;

            let account = data
                .accounts
                .iter_mut()
                .find(|a| &a.subject == subject)
                .ok_or_else(|| StoreError::AccountNotFound {
                    subject: subject.to_string(),
                })?;

            account.credential = Some(credential);
            account.linked_at = Some(Utc::now());
        }

        self.save()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::LockPoisoned {
            message: format!("read lock poisoned: {}", e),
        })?;
        Ok(data.accounts.clone())
    }
}
