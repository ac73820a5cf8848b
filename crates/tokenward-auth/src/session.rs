//! In-flight login sessions
//!
//! [`OAuthStarter`] opens a login and stores the provider session under a fresh code.
//! [`SessionValidator`] looks that code up again when the provider calls back.
//!
//! Expiry is strict: a session whose `expires_at` equals the current second is still valid.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::{Clock, expires_after};
use crate::error::{AuthResult, Rejection, StoreError};
use crate::generator::{SESSION_CODE_LENGTH, TokenGenerator};
use crate::providers::OAuthProvider;
use crate::store::SessionStore;
use crate::types::Session;

/// Starts OAuth logins
#[derive(Debug, Clone)]
pub struct OAuthStarter {
    sessions: Arc<dyn SessionStore>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    code_ttl: i64,
}

impl OAuthStarter {
    /// Create a starter whose sessions live for `code_ttl` seconds
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        code_ttl: i64,
    ) -> Self {
        Self {
            sessions,
            generator,
            clock,
            code_ttl,
        }
    }

    /// Begin a login with `provider` and return the URL to redirect the user to
    ///
    /// # Errors
    ///
    /// Fails with the first error from code generation, the provider or the store.
    /// If the URL cannot be read after the session was stored, the session row stays
    /// behind until it expires.
    pub async fn start_oauth(&self, provider: &dyn OAuthProvider) -> AuthResult<String> {
        let code = self.generator.generate(SESSION_CODE_LENGTH)?;
        let provider_session = provider
            .begin_auth(&code)
            .await?
            .with_provider(provider.name());
        let value = provider_session.marshal()?;

        let now = self.clock.now();
        let expires_at = expires_after(now, self.code_ttl)?;
        self.sessions
            .create(Session {
                id: code,
                value,
                created_at: now,
                expires_at,
            })
            .await?;

        let url = provider_session.auth_url()?.to_string();
        info!(provider = %provider.name(), expires_at, "oauth session started");
        Ok(url)
    }
}

/// Checks in-flight sessions at callback time
#[derive(Debug, Clone)]
pub struct SessionValidator {
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionValidator {
    /// Create a validator
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }

    /// Return the stored provider session for `code` without touching the store
    ///
    /// # Errors
    ///
    /// - [`Rejection::InvalidSession`] if no session exists for `code`
    /// - [`Rejection::SessionExpired`] if it exists but has expired
    /// - [`AuthError::Store`](crate::AuthError::Store) for any other store failure
    pub async fn validate(&self, code: &str) -> AuthResult<String> {
        let session = self.find(code).await?;
        self.check_expiry(&session)?;
        Ok(session.value)
    }

    /// Like [`validate`](Self::validate), but deletes the session first
    ///
    /// The delete happens before the expiry check, so a code is gone after its first
    /// presentation whatever the outcome. Of two concurrent calls with the same code,
    /// only one gets past the delete.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub async fn consume(&self, code: &str) -> AuthResult<String> {
        let session = self.find(code).await?;

        match self.sessions.delete(code).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                debug!("session consumed concurrently");
                return Err(Rejection::InvalidSession.into());
            }
            Err(e) => return Err(e.into()),
        }

        self.check_expiry(&session)?;
        Ok(session.value)
    }

    async fn find(&self, code: &str) -> AuthResult<Session> {
        match self.sessions.find(code).await {
            Ok(session) => Ok(session),
            Err(StoreError::NotFound) => {
                debug!("unknown session code presented");
                Err(Rejection::InvalidSession.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check_expiry(&self, session: &Session) -> AuthResult<()> {
        let now = self.clock.now();
        if session.expires_at < now {
            warn!(expires_at = session.expires_at, now, "expired session presented");
            return Err(Rejection::SessionExpired.into());
        }
        Ok(())
    }
}
