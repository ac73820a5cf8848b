//! OAuth provider capability
//!
//! The engine drives a provider through four steps: start a login for a state value,
//! restore the stored provider session on callback, authorize it with the callback
//! parameters, and fetch the user profile. [`OAuthProvider`] is that capability and
//! [`ProviderRegistry`] maps provider names to implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult, ProviderError, ProviderOperation};
use crate::types::{CallbackParams, ExternalProfile};

pub mod oauth2;

pub use oauth2::{OAuth2Provider, OAuth2ProviderConfig, ProviderPreset};

/// Provider-side state of one login, stored between redirect and callback
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    /// Registry name of the provider that started the login
    #[serde(default)]
    pub provider: String,
    /// State value sent to the provider (the session code)
    pub state: String,
    /// URL the user agent is redirected to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// PKCE verifier matching the challenge in `auth_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_verifier: Option<String>,
    /// Provider access token, set once the session is authorized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("provider", &self.provider)
            .field("state", &"[REDACTED]")
            .field("auth_url", &self.auth_url.as_ref().map(|_| "[SET]"))
            .field("pkce_verifier", &self.pkce_verifier.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProviderSession {
    /// Create a session for the given state and redirect URL
    #[must_use]
    pub fn new(state: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            auth_url: Some(auth_url.into()),
            ..Self::default()
        }
    }

    /// Attach a PKCE verifier
    #[must_use]
    pub fn with_pkce_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.pkce_verifier = Some(verifier.into());
        self
    }

    /// Bind the session to the provider named `provider`
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// The redirect URL for this login
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderOperation::AuthUrl`] error if the session carries no URL.
    pub fn auth_url(&self) -> Result<&str, ProviderError> {
        self.auth_url.as_deref().ok_or_else(|| {
            ProviderError::new(ProviderOperation::AuthUrl, "session has no auth url")
        })
    }

    /// True once the provider has handed out an access token
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.access_token.is_some()
    }

    /// Serialize for storage in a [`Session`](crate::types::Session) record
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderOperation::BeginAuth`] error if serialization fails.
    pub fn marshal(&self) -> Result<String, ProviderError> {
        serde_json::to_string(self)
            .map_err(|e| ProviderError::new(ProviderOperation::BeginAuth, e.to_string()))
    }

    /// Restore a session produced by [`marshal`](Self::marshal)
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderOperation::UnmarshalSession`] error for malformed input.
    pub fn unmarshal(raw: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(raw)
            .map_err(|e| ProviderError::new(ProviderOperation::UnmarshalSession, e.to_string()))
    }
}

/// A third-party OAuth provider
#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    /// Registry name, also the first path segment of the HTTP routes
    fn name(&self) -> &str;

    /// Start a login whose callback will carry `state`
    async fn begin_auth(&self, state: &str) -> Result<ProviderSession, ProviderError>;

    /// Restore a stored provider session
    fn unmarshal_session(&self, raw: &str) -> Result<ProviderSession, ProviderError> {
        ProviderSession::unmarshal(raw)
    }

    /// Complete the provider side of the login using the callback parameters
    async fn authorize(
        &self,
        session: &mut ProviderSession,
        params: &CallbackParams,
    ) -> Result<(), ProviderError>;

    /// Fetch the profile of the user behind an authorized session
    async fn fetch_user(&self, session: &ProviderSession)
    -> Result<ExternalProfile, ProviderError>;
}

/// Provider lookup by name, fixed at construction
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its own name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    /// Builder form of [`register`](Self::register)
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownProvider`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> AuthResult<Arc<dyn OAuthProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    /// Registered provider names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True if no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
