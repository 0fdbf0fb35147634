//! The three-legged authorization flow against the activity provider.
//!
//! This module provides [`AuthFlowController`], which orchestrates the
//! OAuth handshake: building the consent-screen redirect with the subject
//! identifier carried as `state`, and exchanging the returned
//! authorization code for the initial delegated credential.
//!
//! The initiating request must already be identity-verified; the `state`
//! echoed back by the provider is the sole binding between the callback
//! and the subject. The binding is the bare subject identifier; see
//! DESIGN.md for the signed-state hardening recommendation.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::model::{DelegatedCredential, SubjectId};
use crate::provider::{ProviderConfig, TokenRequest, TokenResponse};
use crate::store::{AccountStore, Secret, StoreError};
use crate::token_manager::PROVIDER_TIMEOUT;

/// Error type for authorization flow operations.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// A required callback parameter was empty or absent. Detected
    /// before any network call.
    #[error("missing required parameter: {name}")]
    MissingParameter { name: &'static str },

    /// The `state` value does not name any stored account. The flow
    /// cannot create an account; accounts are born from identity-provider
    /// login only.
    #[error("no account for subject {subject}")]
    AccountNotFound { subject: String },

    /// The provider rejected the code exchange or answered with a
    /// malformed response.
    #[error("authorization code exchange failed: {message}")]
    ExchangeFailed { message: String },

    /// The provider call exceeded its bounded timeout.
    #[error("provider call timed out")]
    ProviderTimeout,

    /// The configured authorization endpoint is not a valid URL.
    #[error("invalid provider endpoint: {message}")]
    InvalidEndpoint { message: String },

    /// Persistence failure, not masked.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Orchestrates the authorization code flow for linking a subject's
/// account to the activity provider.
pub struct AuthFlowController {
    store: Arc<dyn AccountStore>,
    provider: ProviderConfig,
    http_client: reqwest::Client,
}

impl AuthFlowController {
    /// Create a new flow controller over the given store and provider.
    pub fn new(store: Arc<dyn AccountStore>, provider: ProviderConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            store,
            provider,
            http_client,
        }
    }

    /// Override the outbound provider timeout.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    /// Build the consent-screen URL for an identity-verified subject.
    ///
    /// The subject identifier is embedded as the `state` parameter so the
    /// callback can resume the correct account.
    pub fn begin_authorization(&self, subject: &SubjectId) -> Result<Url, AuthFlowError> {
        let mut url =
            Url::parse(&self.provider.auth_url).map_err(|e| AuthFlowError::InvalidEndpoint {
                message: e.to_string(),
            })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.provider.client_id)
            .append_pair("redirect_uri", &self.provider.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.provider.scope_param())
            .append_pair("state", subject.as_str());

        tracing::debug!("built consent URL for {}", subject);
        Ok(url)
    }

    /// Exchange the callback's authorization code and attach the
    /// resulting delegated credential to the account named by `state`.
    ///
    /// Safe to re-run with a fresh code for the same subject (the prior
    /// credential is overwritten); the provider enforces single use of
    /// each code.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(), AuthFlowError> {
        if code.is_empty() {
            return Err(AuthFlowError::MissingParameter { name: "code" });
        }
        if state.is_empty() {
            return Err(AuthFlowError::MissingParameter { name: "state" });
        }

        let subject = SubjectId::new(state);
        let token_response = self.exchange_code(code).await?;

        let refresh_token =
            token_response
                .refresh_token
                .ok_or_else(|| AuthFlowError::ExchangeFailed {
                    message: "token response missing refresh_token".to_string(),
                })?;

        let credential = DelegatedCredential {
            access_token: Secret::new(token_response.access_token),
            refresh_token: Secret::new(refresh_token),
            expires_at: token_response.expires_at,
            provider_account_id: token_response.athlete.map(|a| a.id),
        };

        // Update-only: the flow never creates an account out of thin air.
        self.store
            .upsert_credential(&subject, credential)
            .await
            .map_err(|e| match e {
                StoreError::AccountNotFound { subject } => {
                    AuthFlowError::AccountNotFound { subject }
                }
                other => AuthFlowError::Store(other),
            })?;

        tracing::info!(
            "delegated credential attached for {} at {}",
            subject,
            Utc::now()
        );
        Ok(())
    }

    /// POST the authorization code to the provider's token endpoint.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthFlowError> {
        let request = TokenRequest::authorization_code(&self.provider, code);

        let response = self
            .http_client
            .post(&self.provider.token_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthFlowError::ProviderTimeout
                } else {
                    AuthFlowError::ExchangeFailed {
                        message: format!("network error: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("provider refused code exchange: {}", status);
            return Err(AuthFlowError::ExchangeFailed {
                message: format!("provider returned {}", status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthFlowError::ExchangeFailed {
                message: format!("malformed token response: {}", e),
            })
    }
}
