//! Activity provider configuration and wire types.
//!
//! This module provides:
//! - [`ProviderConfig`] - Endpoints and client credentials for the provider
//! - [`TokenRequest`] / [`TokenResponse`] - The token endpoint wire contract
//!
//! The wire contract is fixed by the external provider and is bit-exact:
//! the token endpoint takes a JSON POST of client credentials plus either
//! an authorization `code` or a `refresh_token`, and answers with an
//! access token, an *absolute* `expires_at` epoch timestamp, an optional
//! rotated `refresh_token`, and (on code exchange) the provider-side
//! account under `athlete.id`.

use serde::{Deserialize, Serialize};

use crate::store::Secret;

/// Configuration for the activity provider.
///
/// # Example
///
/// ```
/// use stridelink_core::provider::ProviderConfig;
///
/// let provider = ProviderConfig::strava("my-client-id", "my-client-secret")
///     .with_redirect_uri("https://app.example.com/auth/provider/callback");
/// assert!(provider.auth_url.contains("strava.com"));
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OAuth authorization (consent screen) endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL, used for both code exchange and refresh.
    pub token_url: String,

    /// Base URL of the provider's REST API.
    pub api_base: String,

    /// OAuth client ID issued to this application.
    pub client_id: String,

    /// OAuth client secret issued to this application.
    pub client_secret: Secret,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Scopes requested at authorization, comma-separated on the wire.
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Create a provider configuration with empty endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            auth_url: String::new(),
            token_url: String::new(),
            api_base: String::new(),
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret),
            redirect_uri: String::new(),
            scopes: Vec::new(),
        }
    }

    /// Create a configuration for Strava with its production endpoints
    /// and the activity read/write scopes.
    pub fn strava(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::new(client_id, client_secret)
            .with_auth_url("https://www.strava.com/oauth/authorize")
            .with_token_url("https://www.strava.com/oauth/token")
            .with_api_base("https://www.strava.com/api/v3")
            .with_scopes(vec![
                "activity:read_all".to_string(),
                "activity:write".to_string(),
            ])
    }

    /// Set the authorization URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Set the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// The comma-separated scope string sent to the consent screen.
    pub fn scope_param(&self) -> String {
        self.scopes.join(",")
    }
}

/// JSON body posted to the provider's token endpoint.
#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenRequest {
    /// Request exchanging an authorization code for an initial token set.
    pub fn authorization_code(provider: &ProviderConfig, code: impl Into<String>) -> Self {
        Self {
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.expose().to_string(),
            grant_type: "authorization_code",
            code: Some(code.into()),
            refresh_token: None,
        }
    }

    /// Request exchanging a refresh token for a new access token.
    pub fn refresh(provider: &ProviderConfig, refresh_token: impl Into<String>) -> Self {
        Self {
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.expose().to_string(),
            grant_type: "refresh_token",
            code: None,
            refresh_token: Some(refresh_token.into()),
        }
    }
}

/// Provider-side account summary returned by the code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteSummary {
    pub id: i64,
}

/// JSON body returned by the provider's token endpoint.
///
/// `refresh_token` is optional: on refresh the provider may omit it,
/// signaling that the stored refresh token is unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: i64,
    #[serde(default)]
    pub athlete: Option<AthleteSummary>,
}
