//! HTTP server assembly: shared state and router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post, put};
use axum::Router;

use stridelink_core::{
    activities::ActivityProxy,
    auth_flow::AuthFlowController,
    identity::IdentityVerifier,
    provider::ProviderConfig,
    store::AccountStore,
    token_manager::{TokenManager, PROVIDER_TIMEOUT},
    FileStore, JwtVerifier,
};

use crate::api::handlers;
use crate::config::{FrontendSettings, ServerConfig};

/// Shared state for API handlers.
///
/// All clients are constructed exactly once at process start and shared
/// read-only afterwards; nothing here is ambient global state.
#[derive(Clone)]
pub struct ApiState {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub store: Arc<dyn AccountStore>,
    pub tokens: Arc<TokenManager>,
    pub auth_flow: Arc<AuthFlowController>,
    pub activities: Arc<ActivityProxy>,
    pub frontend: FrontendSettings,
}

impl ApiState {
    /// Build the state from loaded configuration.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        if config.provider.client_id.is_empty() || config.provider.client_secret.is_empty() {
            tracing::warn!(
                "provider client credentials are not configured; \
                 authorization and refresh calls will be rejected by the provider"
            );
        }
        if config.identity.jwt_secret.is_empty() {
            anyhow::bail!("identity.jwt_secret is not configured");
        }

        let store: Arc<dyn AccountStore> =
            Arc::new(FileStore::load_from_path(config.accounts_path.clone())?);

        let mut verifier = JwtVerifier::new(&config.identity.jwt_secret);
        if let Some(issuer) = &config.identity.issuer {
            verifier = verifier.with_issuer(issuer);
        }

        let provider = ProviderConfig::strava(
            config.provider.client_id.clone(),
            config.provider.client_secret.clone(),
        )
        .with_redirect_uri(config.provider.redirect_uri.clone());

        Ok(Self::from_parts(
            Arc::new(verifier),
            store,
            provider,
            config.frontend.clone(),
            PROVIDER_TIMEOUT,
        ))
    }

    /// Assemble the state from already-built collaborators.
    ///
    /// Tests use this to substitute an in-memory store, a provider
    /// double, and a short outbound timeout.
    pub fn from_parts(
        verifier: Arc<dyn IdentityVerifier>,
        store: Arc<dyn AccountStore>,
        provider: ProviderConfig,
        frontend: FrontendSettings,
        provider_timeout: Duration,
    ) -> Self {
        let tokens = Arc::new(
            TokenManager::new(store.clone(), provider.clone()).with_timeout(provider_timeout),
        );
        let auth_flow = Arc::new(
            AuthFlowController::new(store.clone(), provider.clone())
                .with_timeout(provider_timeout),
        );
        let activities = Arc::new(
            ActivityProxy::new(tokens.clone(), provider).with_timeout(provider_timeout),
        );

        Self {
            verifier,
            store,
            tokens,
            auth_flow,
            activities,
            frontend,
        }
    }
}

/// Build the API router over the given state.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/provider", get(handlers::begin_provider_auth))
        .route("/auth/provider/callback", get(handlers::provider_callback))
        .route("/api/activities", get(handlers::list_activities))
        .route("/api/activities/:id", put(handlers::update_activity))
        .with_state(state)
}
