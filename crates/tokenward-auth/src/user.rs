//! Local user resolution
//!
//! [`UserResolver`] maps an external identity to a local [`User`], creating it on first
//! sight. [`UserFetcher`] runs the provider side of a callback and hands the resulting
//! identity to the resolver.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ProfileSyncPolicy;
use crate::error::{AuthResult, ProviderError, ProviderOperation, Rejection, StoreError};
use crate::generator::{TokenGenerator, USER_ID_LENGTH};
use crate::profile::ProfileSyncer;
use crate::providers::OAuthProvider;
use crate::store::UserStore;
use crate::types::{CallbackParams, User};

/// Find-or-create for local users
#[derive(Debug, Clone)]
pub struct UserResolver {
    users: Arc<dyn UserStore>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
}

impl UserResolver {
    /// Create a resolver
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            generator,
            clock,
        }
    }

    /// Return the user named `name`, creating it if it does not exist
    ///
    /// Existing users are returned unchanged. When a concurrent caller creates the same
    /// user first, its record is returned.
    ///
    /// # Errors
    ///
    /// Store failures other than "not found" and generator failures.
    pub async fn resolve(&self, name: &str) -> AuthResult<User> {
        match self.users.find(name).await {
            Ok(user) => return Ok(user),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let user = User {
            id: self.generator.generate(USER_ID_LENGTH)?,
            name: name.to_string(),
            created_at: self.clock.now(),
        };

        match self.users.create(user.clone()).await {
            Ok(()) => {
                info!(user_id = %user.id, "user created");
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => {
                debug!("user created concurrently, re-reading");
                Ok(self.users.find(name).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Completes the provider side of a callback and resolves the local user
#[derive(Debug, Clone)]
pub struct UserFetcher {
    resolver: UserResolver,
    syncer: Arc<dyn ProfileSyncer>,
    sync_policy: ProfileSyncPolicy,
}

impl UserFetcher {
    /// Create a fetcher
    #[must_use]
    pub fn new(
        resolver: UserResolver,
        syncer: Arc<dyn ProfileSyncer>,
        sync_policy: ProfileSyncPolicy,
    ) -> Self {
        Self {
            resolver,
            syncer,
            sync_policy,
        }
    }

    /// Turn a stored provider session and the callback parameters into a local user
    ///
    /// # Errors
    ///
    /// - [`Rejection::InvalidSession`] if the session was started by another provider
    /// - [`AuthError::Provider`](crate::AuthError::Provider) tagged with the failing step:
    ///   session restore, authorization or profile fetch (a profile without email is a
    ///   fetch failure)
    /// - resolver errors, unchanged
    /// - [`AuthError::ProfileSync`](crate::AuthError::ProfileSync) under
    ///   [`ProfileSyncPolicy::Required`]
    pub async fn fetch(
        &self,
        provider: &dyn OAuthProvider,
        value: &str,
        params: &CallbackParams,
    ) -> AuthResult<User> {
        let mut session = provider.unmarshal_session(value)?;
        if session.provider != provider.name() {
            warn!(
                started_with = %session.provider,
                presented_to = %provider.name(),
                "session presented to another provider"
            );
            return Err(Rejection::InvalidSession.into());
        }
        provider.authorize(&mut session, params).await?;
        let profile = provider.fetch_user(&session).await?;

        let email = profile.email.as_deref().ok_or_else(|| {
            ProviderError::new(ProviderOperation::FetchUser, "profile has no email")
        })?;

        let user = self.resolver.resolve(email).await?;

        if let Err(e) = self.syncer.update(&user.id, &profile.raw).await {
            match self.sync_policy {
                ProfileSyncPolicy::Required => return Err(e),
                ProfileSyncPolicy::BestEffort => {
                    warn!(user_id = %user.id, error = %e, "profile sync failed, continuing");
                }
            }
        }

        debug!(provider = %provider.name(), user_id = %user.id, "callback user resolved");
        Ok(user)
    }
}
