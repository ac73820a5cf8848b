//! Sign-in and refresh facade
//!
//! [`AuthService`] wires the engine components together and exposes the three operations
//! an adapter needs: start a login, complete it, and rotate a refresh token.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokenward_auth::{
//!     AuthConfig, AuthService, OAuth2Provider, OAuth2ProviderConfig, ProviderPreset,
//! };
//!
//! # fn main() -> Result<(), tokenward_auth::AuthError> {
//! let google = OAuth2Provider::new(OAuth2ProviderConfig::preset(
//!     ProviderPreset::Google,
//!     "client-id",
//!     "client-secret",
//!     "https://auth.example.com/google/callback",
//! ))?;
//!
//! let service = AuthService::builder(AuthConfig::new("signing-key"))
//!     .provider(Arc::new(google))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::claims::{ClaimsProvider, NoClaims};
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, SessionPolicy};
use crate::error::AuthResult;
use crate::generator::{SecureTokenGenerator, TokenGenerator};
use crate::issuer::TokenIssuer;
use crate::profile::{NoopProfileSyncer, ProfileSyncer};
use crate::providers::{OAuthProvider, ProviderRegistry};
use crate::refresh::RefreshRotator;
use crate::session::{OAuthStarter, SessionValidator};
use crate::store::{
    MemoryRefreshTokenStore, MemorySessionStore, MemoryUserStore, RefreshTokenStore, SessionStore,
    UserStore,
};
use crate::types::{CallbackParams, IssuedToken};
use crate::user::{UserFetcher, UserResolver};

/// The auth engine
#[derive(Debug, Clone)]
pub struct AuthService {
    providers: ProviderRegistry,
    starter: OAuthStarter,
    validator: SessionValidator,
    fetcher: UserFetcher,
    issuer: TokenIssuer,
    rotator: RefreshRotator,
    session_policy: SessionPolicy,
}

impl AuthService {
    /// Start building a service
    #[must_use]
    pub fn builder(config: AuthConfig) -> AuthServiceBuilder {
        AuthServiceBuilder::new(config)
    }

    /// Registered providers
    #[must_use]
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Begin a login with the named provider and return the redirect URL
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownProvider`](crate::AuthError::UnknownProvider), or any failure
    /// from [`OAuthStarter::start_oauth`].
    pub async fn start_oauth(&self, provider: &str) -> AuthResult<String> {
        let provider = self.providers.get(provider)?;
        self.starter.start_oauth(provider.as_ref()).await
    }

    /// Complete a login: check the session `code`, resolve the user and issue tokens
    ///
    /// # Errors
    ///
    /// Unknown provider, session rejection, provider, store, claims, profile sync or
    /// signing failures. The first failure ends the sign-in.
    pub async fn sign_in(
        &self,
        provider: &str,
        code: &str,
        params: &CallbackParams,
    ) -> AuthResult<IssuedToken> {
        let provider = self.providers.get(provider)?;

        let value = match self.session_policy {
            SessionPolicy::SingleUse => self.validator.consume(code).await?,
            SessionPolicy::Reusable => self.validator.validate(code).await?,
        };

        let user = self.fetcher.fetch(provider.as_ref(), &value, params).await?;
        let issued = self.issuer.issue(&user).await?;
        info!(provider = %provider.name(), user_id = %user.id, "sign-in complete");
        Ok(issued)
    }

    /// Rotate a refresh token
    ///
    /// # Errors
    ///
    /// See [`RefreshRotator::refresh`].
    pub async fn refresh(&self, refresh_id: &str) -> AuthResult<IssuedToken> {
        self.rotator.refresh(refresh_id).await
    }
}

/// Builder for [`AuthService`]
///
/// Stores default to the in-memory implementations, claims to [`NoClaims`], profile sync
/// to [`NoopProfileSyncer`], the clock to [`SystemClock`] and the generator to
/// [`SecureTokenGenerator`].
#[derive(Debug)]
pub struct AuthServiceBuilder {
    config: AuthConfig,
    providers: ProviderRegistry,
    sessions: Option<Arc<dyn SessionStore>>,
    refresh_tokens: Option<Arc<dyn RefreshTokenStore>>,
    users: Option<Arc<dyn UserStore>>,
    claims: Arc<dyn ClaimsProvider>,
    syncer: Arc<dyn ProfileSyncer>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
}

impl AuthServiceBuilder {
    fn new(config: AuthConfig) -> Self {
        Self {
            config,
            providers: ProviderRegistry::new(),
            sessions: None,
            refresh_tokens: None,
            users: None,
            claims: Arc::new(NoClaims),
            syncer: Arc::new(NoopProfileSyncer),
            generator: Arc::new(SecureTokenGenerator::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Register a provider
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    /// Replace the provider registry
    #[must_use]
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Use a session store
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Use a refresh token store
    #[must_use]
    pub fn refresh_token_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.refresh_tokens = Some(store);
        self
    }

    /// Use a user store
    #[must_use]
    pub fn user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.users = Some(store);
        self
    }

    /// Use a claims provider
    #[must_use]
    pub fn claims_provider(mut self, claims: Arc<dyn ClaimsProvider>) -> Self {
        self.claims = claims;
        self
    }

    /// Use a profile syncer
    #[must_use]
    pub fn profile_syncer(mut self, syncer: Arc<dyn ProfileSyncer>) -> Self {
        self.syncer = syncer;
        self
    }

    /// Use a token generator
    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Use a clock
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and assemble the service
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`](crate::AuthError::Configuration) if
    /// [`AuthConfig::validate`] fails.
    pub fn build(self) -> AuthResult<AuthService> {
        self.config.validate()?;

        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>);
        let refresh_tokens = self.refresh_tokens.unwrap_or_else(|| {
            Arc::new(MemoryRefreshTokenStore::new()) as Arc<dyn RefreshTokenStore>
        });
        let users = self
            .users
            .unwrap_or_else(|| Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>);

        let issuer = TokenIssuer::new(
            &self.config,
            refresh_tokens.clone(),
            self.claims,
            self.generator.clone(),
            self.clock.clone(),
        );
        let resolver = UserResolver::new(users, self.generator.clone(), self.clock.clone());

        Ok(AuthService {
            providers: self.providers,
            starter: OAuthStarter::new(
                sessions.clone(),
                self.generator,
                self.clock.clone(),
                self.config.code_ttl,
            ),
            validator: SessionValidator::new(sessions, self.clock.clone()),
            fetcher: UserFetcher::new(resolver, self.syncer, self.config.profile_sync_policy),
            rotator: RefreshRotator::new(refresh_tokens, issuer.clone(), self.clock),
            issuer,
            session_policy: self.config.session_policy,
        })
    }
}
