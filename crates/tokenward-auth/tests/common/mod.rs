//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for the sign-in and rotation tests:
//! a wiremock-backed OAuth2 server, an in-process fake provider, stores that fail on
//! demand and a harness that wires an `AuthService` around a manual clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value, json};
use tokenward_auth::{
    AuthConfig, AuthError, AuthResult, AuthService, AuthServiceBuilder, CallbackParams,
    ExternalProfile, ManualClock, MemoryRefreshTokenStore, MemorySessionStore, MemoryUserStore,
    OAuthProvider, ProviderError, ProviderOperation, ProviderSession, RefreshToken,
    RefreshTokenStore, SecureTokenGenerator, Session, SessionStore, StoreError, TokenGenerator,
    User, UserStore,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Signing key used by every harness
pub const TEST_SECRET: &str = "integration-test-secret";

/// Fixed start time for the manual clock
pub const T0: i64 = 1_700_000_000;

/// OAuth2 mock server configuration
pub struct MockOAuth2Server {
    pub server: MockServer,
    pub token_endpoint: String,
    pub authorize_endpoint: String,
    pub userinfo_endpoint: String,
}

impl MockOAuth2Server {
    /// Create a new mock OAuth2 authorization server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();

        Self {
            server,
            token_endpoint: format!("{}/token", base_url),
            authorize_endpoint: format!("{}/authorize", base_url),
            userinfo_endpoint: format!("{}/userinfo", base_url),
        }
    }

    /// Mock successful token endpoint response (code exchange)
    pub async fn mock_token_success(&self, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "openid profile email",
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock token endpoint error response
    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock userinfo endpoint
    pub async fn mock_userinfo(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

/// In-process provider: any callback carrying `code` authorizes, and the
/// profile email is derived from the code (`jane` becomes `jane@example.com`)
#[derive(Debug, Default)]
pub struct FakeProvider {
    name: String,
    fail_fetch: AtomicBool,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_fetch: AtomicBool::new(false),
        }
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin_auth(&self, state: &str) -> Result<ProviderSession, ProviderError> {
        Ok(ProviderSession::new(
            state,
            format!("https://idp.test/{}/authorize?state={}", self.name, state),
        ))
    }

    async fn authorize(
        &self,
        session: &mut ProviderSession,
        params: &CallbackParams,
    ) -> Result<(), ProviderError> {
        let code = params.get("code").ok_or_else(|| {
            ProviderError::new(ProviderOperation::Authorize, "missing authorization code")
        })?;
        session.access_token = Some(code.to_string());
        Ok(())
    }

    async fn fetch_user(
        &self,
        session: &ProviderSession,
    ) -> Result<ExternalProfile, ProviderError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                ProviderOperation::FetchUser,
                "userinfo unavailable",
            ));
        }
        let code = session.access_token.as_deref().unwrap_or("anonymous");
        let raw = json!({"email": format!("{code}@example.com"), "name": code});
        Ok(ExternalProfile::from_raw(raw.as_object().cloned().unwrap_or_default()))
    }
}

/// Refresh token store whose operations can be switched to fail
#[derive(Debug, Default)]
pub struct FlakyRefreshStore {
    pub inner: MemoryRefreshTokenStore,
    pub fail_find: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl RefreshTokenStore for FlakyRefreshStore {
    async fn create(&self, token: RefreshToken) -> Result<(), StoreError> {
        self.inner.create(token).await
    }

    async fn find(&self, id: &str) -> Result<RefreshToken, StoreError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.find(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("lock timeout".into()));
        }
        self.inner.delete(id).await
    }
}

/// Session store whose writes can be switched to fail
#[derive(Debug, Default)]
pub struct FlakySessionStore {
    pub inner: MemorySessionStore,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn create(&self, session: Session) -> Result<(), StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.create(session).await
    }

    async fn find(&self, id: &str) -> Result<Session, StoreError> {
        self.inner.find(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("lock timeout".into()));
        }
        self.inner.delete(id).await
    }
}

/// User store whose lookups can be switched to fail
#[derive(Debug, Default)]
pub struct FlakyUserStore {
    pub inner: MemoryUserStore,
    pub fail_find: AtomicBool,
}

#[async_trait]
impl UserStore for FlakyUserStore {
    async fn find(&self, name: &str) -> Result<User, StoreError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.find(name).await
    }

    async fn create(&self, user: User) -> Result<(), StoreError> {
        self.inner.create(user).await
    }
}

/// Token generator that can be switched to report an exhausted entropy source
#[derive(Debug, Default)]
pub struct FlakyGenerator {
    inner: SecureTokenGenerator,
    pub fail: AtomicBool,
}

impl FlakyGenerator {
    pub fn failing() -> Self {
        let generator = Self::default();
        generator.fail.store(true, Ordering::SeqCst);
        generator
    }
}

impl TokenGenerator for FlakyGenerator {
    fn generate(&self, len: usize) -> AuthResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::Generation("entropy source unavailable".into()));
        }
        self.inner.generate(len)
    }
}

/// An `AuthService` wired to in-memory stores and a manual clock
pub struct Harness {
    pub service: AuthService,
    pub sessions: MemorySessionStore,
    pub refresh_tokens: MemoryRefreshTokenStore,
    pub users: MemoryUserStore,
    pub clock: Arc<ManualClock>,
    pub provider: Arc<FakeProvider>,
}

impl Harness {
    /// Default configuration with the fake provider registered as `fake`
    pub fn new() -> Self {
        Self::with_config(AuthConfig::new(TEST_SECRET))
    }

    pub fn with_config(config: AuthConfig) -> Self {
        Self::customized(config, |builder| builder)
    }

    /// Build with extra builder steps (claims provider, profile syncer, ...)
    pub fn customized(
        config: AuthConfig,
        customize: impl FnOnce(AuthServiceBuilder) -> AuthServiceBuilder,
    ) -> Self {
        let sessions = MemorySessionStore::new();
        let refresh_tokens = MemoryRefreshTokenStore::new();
        let users = MemoryUserStore::new();
        let clock = Arc::new(ManualClock::new(T0));
        let provider = Arc::new(FakeProvider::new("fake"));

        let builder = AuthService::builder(config)
            .provider(provider.clone())
            .session_store(Arc::new(sessions.clone()))
            .refresh_token_store(Arc::new(refresh_tokens.clone()))
            .user_store(Arc::new(users.clone()))
            .clock(clock.clone());
        let service = customize(builder).build().expect("valid test configuration");

        Self {
            service,
            sessions,
            refresh_tokens,
            users,
            clock,
            provider,
        }
    }

    /// Start a login with the fake provider and return the session code
    pub async fn start(&self) -> String {
        let url = self.service.start_oauth("fake").await.expect("start_oauth");
        state_from_url(&url)
    }

    /// Full sign-in for the user named `who`
    pub async fn sign_in(&self, who: &str) -> tokenward_auth::IssuedToken {
        let code = self.start().await;
        let params = CallbackParams::new().with("state", &code).with("code", who);
        self.service
            .sign_in("fake", &code, &params)
            .await
            .expect("sign_in")
    }
}

/// Extract the `state` query parameter of a redirect URL
pub fn state_from_url(url: &str) -> String {
    url::Url::parse(url)
        .expect("valid redirect url")
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("redirect url carries state")
}

/// Decode an access token signed with [`TEST_SECRET`] without checking `exp`
pub fn decode_access(token: &str) -> Map<String, Value> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    jsonwebtoken::decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
        &validation,
    )
    .expect("access token verifies")
    .claims
}
