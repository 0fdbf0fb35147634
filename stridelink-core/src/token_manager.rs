//! Delegated-credential lifecycle management.
//!
//! This module provides [`TokenManager`], which turns a subject identifier
//! into a currently-valid provider access token: it reads the stored
//! delegated credential, detects expiry, transparently refreshes through
//! the provider's token endpoint, and persists any rotated refresh token.
//!
//! # Refresh semantics
//!
//! - A token is expired once `now >= expires_at`; the boundary instant
//!   counts as expired.
//! - On refresh the provider may omit `refresh_token` from its response,
//!   signaling the stored one is unchanged; it is retained in that case.
//! - A failed refresh leaves the stored credential untouched so a retry
//!   can be attempted by the caller.
//! - Refresh-and-persist is serialized per subject: concurrent callers
//!   for the same expired credential coalesce onto one in-flight refresh
//!   instead of issuing duplicate provider calls, which would corrupt the
//!   stored credential under provider-side refresh token rotation.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use stridelink_core::{
//!     provider::ProviderConfig,
//!     store::MemoryStore,
//!     token_manager::TokenManager,
//!     SubjectId,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let provider = ProviderConfig::strava("client-id", "client-secret");
//! let manager = TokenManager::new(store, provider);
//!
//! let token = manager.get_valid_access_token(&SubjectId::new("u1")).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::model::{DelegatedCredential, SubjectId};
use crate::provider::{ProviderConfig, TokenRequest, TokenResponse};
use crate::store::{AccountStore, Secret, StoreError};

/// Bound on every outbound provider call. A call still pending after
/// this long fails with [`TokenError::ProviderTimeout`].
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for token lifecycle operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No delegated credential is stored for the subject. The caller
    /// must route the user through the authorization flow.
    #[error("no delegated credential for subject {subject}")]
    NotLinked { subject: String },

    /// The provider rejected the refresh attempt or answered with a
    /// malformed response. The stored refresh token is presumed dead;
    /// the user must re-authorize from scratch.
    #[error("token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// The provider call exceeded its bounded timeout. Retryable by the
    /// caller; never retried here.
    #[error("provider call timed out")]
    ProviderTimeout,

    /// Persistence failure, not masked.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Manages the delegated OAuth token lifecycle for all subjects.
///
/// Holds no cache beyond the account store: every call re-reads current
/// state, and the only write it ever performs is persisting a successful
/// refresh.
pub struct TokenManager {
    store: Arc<dyn AccountStore>,
    provider: ProviderConfig,
    http_client: reqwest::Client,
    refresh_locks: parking_lot::Mutex<HashMap<SubjectId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    /// Create a new token manager over the given store and provider.
    pub fn new(store: Arc<dyn AccountStore>, provider: ProviderConfig) -> Self {
        Self {
            store,
            provider,
            http_client: provider_client(PROVIDER_TIMEOUT),
            refresh_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Override the outbound provider timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = provider_client(timeout);
        self
    }

    /// Return a currently-valid access token for the subject,
    /// transparently refreshing an expired one.
    ///
    /// Zero persistence writes when the stored token is still valid;
    /// exactly one write on a successful refresh; zero writes on failure.
    pub async fn get_valid_access_token(
        &self,
        subject: &SubjectId,
    ) -> Result<Secret, TokenError> {
        let credential = self.stored_credential(subject).await?;

        if !credential.is_expired() {
            tracing::debug!("using stored access token for {}", subject);
            return Ok(credential.access_token);
        }

        // Serialize refresh-and-persist per subject. The winner of a race
        // refreshes; losers re-read and find a fresh token.
        let lock = self.subject_lock(subject);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_still_expired(subject).await
        };

        drop(lock);
        self.evict_idle_lock(subject);
        result
    }

    /// Refresh under the subject lock, unless a racing caller already did.
    async fn refresh_if_still_expired(&self, subject: &SubjectId) -> Result<Secret, TokenError> {
        let credential = self.stored_credential(subject).await?;
        if !credential.is_expired() {
            tracing::debug!("refresh for {} coalesced onto a completed one", subject);
            return Ok(credential.access_token);
        }

        tracing::info!("access token expired for {}, refreshing", subject);
        let refreshed = self.refresh_credential(subject, &credential).await?;
        Ok(refreshed.access_token)
    }

    /// Read the stored credential, failing when the subject has never
    /// linked the provider.
    async fn stored_credential(
        &self,
        subject: &SubjectId,
    ) -> Result<DelegatedCredential, TokenError> {
        let account = self.store.find_by_subject(subject).await?;

        account
            .and_then(|a| a.credential)
            .ok_or_else(|| TokenError::NotLinked {
                subject: subject.to_string(),
            })
    }

    /// Call the provider's token endpoint with the stored refresh token
    /// and persist the result.
    ///
    /// On any failure the stored credential is left bit-for-bit intact.
    async fn refresh_credential(
        &self,
        subject: &SubjectId,
        current: &DelegatedCredential,
    ) -> Result<DelegatedCredential, TokenError> {
        let request = TokenRequest::refresh(&self.provider, current.refresh_token.expose());

        let response = self
            .http_client
            .post(&self.provider.token_url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("provider refused refresh for {}: {}", subject, status);
            return Err(TokenError::RefreshFailed {
                message: format!("provider returned {}", status),
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| TokenError::RefreshFailed {
                message: format!("malformed token response: {}", e),
            })?;

        let refreshed = DelegatedCredential {
            access_token: Secret::new(token_response.access_token),
            // Providers may omit the refresh token, signaling "unchanged".
            refresh_token: token_response
                .refresh_token
                .map(Secret::new)
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: token_response.expires_at,
            provider_account_id: current.provider_account_id,
        };

        self.store.upsert_credential(subject, refreshed.clone()).await?;

        tracing::info!("refreshed access token for {}", subject);
        Ok(refreshed)
    }

    /// The async mutex guarding refresh for one subject.
    fn subject_lock(&self, subject: &SubjectId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock();
        locks
            .entry(subject.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop a subject's lock entry once no caller holds it anymore.
    ///
    /// All clones of the entry are handed out under the map mutex, so a
    /// strong count of one here means the map holds the only reference.
    fn evict_idle_lock(&self, subject: &SubjectId) {
        let mut locks = self.refresh_locks.lock();
        if let Some(entry) = locks.get(subject) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(subject);
            }
        }
    }
}

/// HTTP client for the provider's token endpoint.
fn provider_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Map a reqwest transport failure into the token taxonomy.
fn map_transport_error(e: reqwest::Error) -> TokenError {
    if e.is_timeout() {
        TokenError::ProviderTimeout
    } else {
        TokenError::RefreshFailed {
            message: format!("network error: {}", e),
        }
    }
}
