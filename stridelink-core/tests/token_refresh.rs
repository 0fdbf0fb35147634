//! Integration tests for the token lifecycle manager.
//!
//! These tests verify that the TokenManager correctly:
//! - Returns non-expired tokens without touching the store
//! - Detects expiry (inclusive of the boundary instant) and refreshes
//! - Retains the stored refresh token when the provider omits a new one
//! - Leaves stored state untouched on refresh failure
//! - Coalesces concurrent refreshes for one subject

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stridelink_core::{
    model::{Account, DelegatedCredential, Profile, SubjectId},
    provider::ProviderConfig,
    store::{AccountStore, MemoryStore, Secret, StoreError},
    token_manager::{TokenError, TokenManager},
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Store wrapper that counts credential writes, for asserting the
/// exactly-one-write / zero-writes properties.
struct CountingStore {
    inner: MemoryStore,
    credential_writes: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            credential_writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.credential_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for CountingStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_subject(subject).await
    }

    async fn upsert_profile(
        &self,
        subject: &SubjectId,
        profile: Profile,
    ) -> Result<Account, StoreError> {
        self.inner.upsert_profile(subject, profile).await
    }

    async fn upsert_credential(
        &self,
        subject: &SubjectId,
        credential: DelegatedCredential,
    ) -> Result<(), StoreError> {
        self.credential_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_credential(subject, credential).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts().await
    }
}

fn test_profile() -> Profile {
    Profile {
        email: "u1@example.com".to_string(),
        display_name: "User One".to_string(),
        avatar_url: None,
    }
}

fn test_provider(token_url: &str) -> ProviderConfig {
    ProviderConfig::new("test-client-id", "test-client-secret")
        .with_token_url(token_url.to_string())
        .with_auth_url("https://provider.example.com/authorize")
        .with_api_base("https://provider.example.com/api")
}

/// Seed a store with a linked account for "u1".
async fn seed_linked(store: &dyn AccountStore, expires_at: i64) -> SubjectId {
    let subject = SubjectId::new("u1");
    store.upsert_profile(&subject, test_profile()).await.unwrap();
    store
        .upsert_credential(
            &subject,
            DelegatedCredential {
                access_token: Secret::new("A"),
                refresh_token: Secret::new("R"),
                expires_at,
                provider_account_id: Some(42),
            },
        )
        .await
        .unwrap();
    subject
}

#[tokio::test]
async fn test_valid_token_returned_with_zero_writes() {
    let store = Arc::new(CountingStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() + 3600).await;
    let writes_after_seed = store.writes();

    let manager = TokenManager::new(store.clone(), test_provider("https://unused.example.com"));

    let token = manager.get_valid_access_token(&subject).await.unwrap();
    assert_eq!(token.expose(), "A");
    assert_eq!(store.writes(), writes_after_seed);
}

#[tokio::test]
async fn test_expired_token_triggers_one_refresh_and_one_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "grant_type": "refresh_token",
            "refresh_token": "R"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_at": Utc::now().timestamp() + 21600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(CountingStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() - 60).await;
    let writes_after_seed = store.writes();

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let token = manager.get_valid_access_token(&subject).await.unwrap();
    assert_eq!(token.expose(), "A2");
    assert_eq!(store.writes(), writes_after_seed + 1);

    let stored = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();
    assert_eq!(stored.access_token.expose(), "A2");
    assert_eq!(stored.refresh_token.expose(), "R2");
    assert_eq!(stored.provider_account_id, Some(42));
}

#[tokio::test]
async fn test_omitted_refresh_token_is_retained() {
    let mock_server = MockServer::start().await;
    let future = Utc::now().timestamp() + 21600;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A2",
            "expires_at": future
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() - 60).await;

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let token = manager.get_valid_access_token(&subject).await.unwrap();
    assert_eq!(token.expose(), "A2");

    let stored = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();
    assert_eq!(stored.access_token.expose(), "A2");
    assert_eq!(stored.refresh_token.expose(), "R");
    assert_eq!(stored.expires_at, future);
}

#[tokio::test]
async fn test_failed_refresh_leaves_credential_intact() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The refresh token is invalid"
        })))
        .mount(&mock_server)
        .await;

    let store = Arc::new(CountingStore::new());
    let expired_at = Utc::now().timestamp() - 60;
    let subject = seed_linked(store.as_ref(), expired_at).await;
    let writes_after_seed = store.writes();

    let before = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let result = manager.get_valid_access_token(&subject).await;
    assert!(matches!(result, Err(TokenError::RefreshFailed { .. })));
    assert_eq!(store.writes(), writes_after_seed);

    let after = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_malformed_refresh_response_leaves_credential_intact() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() - 60).await;

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let result = manager.get_valid_access_token(&subject).await;
    assert!(matches!(result, Err(TokenError::RefreshFailed { .. })));

    let stored = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();
    assert_eq!(stored.access_token.expose(), "A");
    assert_eq!(stored.refresh_token.expose(), "R");
}

#[tokio::test]
async fn test_token_expiring_this_instant_is_refreshed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A2",
            "expires_at": Utc::now().timestamp() + 21600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    // Expiry boundary: a token valid *at* its expiry instant is expired.
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp()).await;

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let token = manager.get_valid_access_token(&subject).await.unwrap();
    assert_eq!(token.expose(), "A2");
}

#[tokio::test]
async fn test_unlinked_subject_fails_without_provider_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let subject = SubjectId::new("u1");
    store.upsert_profile(&subject, test_profile()).await.unwrap();

    let manager = TokenManager::new(
        store,
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    );

    let result = manager.get_valid_access_token(&subject).await;
    assert!(matches!(result, Err(TokenError::NotLinked { .. })));
}

#[tokio::test]
async fn test_slow_provider_surfaces_timeout_without_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(500))
                .set_body_json(serde_json::json!({
                    "access_token": "A2",
                    "expires_at": Utc::now().timestamp() + 21600
                })),
        )
        .mount(&mock_server)
        .await;

    let store = Arc::new(CountingStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() - 60).await;
    let writes_after_seed = store.writes();

    let manager = TokenManager::new(
        store.clone(),
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    )
    .with_timeout(std::time::Duration::from_millis(100));

    let result = manager.get_valid_access_token(&subject).await;
    assert!(matches!(result, Err(TokenError::ProviderTimeout)));
    assert_eq!(store.writes(), writes_after_seed);

    let stored = store
        .find_by_subject(&subject)
        .await
        .unwrap()
        .unwrap()
        .credential
        .unwrap();
    assert_eq!(stored.access_token.expose(), "A");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(50))
                .set_body_json(serde_json::json!({
                    "access_token": "A2",
                    "refresh_token": "R2",
                    "expires_at": Utc::now().timestamp() + 21600
                })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let subject = seed_linked(store.as_ref(), Utc::now().timestamp() - 60).await;

    let manager = Arc::new(TokenManager::new(
        store,
        test_provider(&format!("{}/oauth/token", mock_server.uri())),
    ));

    let (a, b) = tokio::join!(
        manager.get_valid_access_token(&subject),
        manager.get_valid_access_token(&subject),
    );

    assert_eq!(a.unwrap().expose(), "A2");
    assert_eq!(b.unwrap().expose(), "A2");
}
