//! Refresh token rotation
//!
//! A presented refresh token is looked up, deleted, and only then checked for expiry.
//! Deleting first means a token can never be presented successfully twice, and an
//! expired token is gone after its first presentation too. The successor pair is minted
//! by [`TokenIssuer`], so every rotation produces a brand-new refresh token.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{AuthResult, Rejection, StoreError};
use crate::issuer::TokenIssuer;
use crate::store::RefreshTokenStore;
use crate::types::IssuedToken;

/// Exchanges a refresh token for a new token pair
#[derive(Debug, Clone)]
pub struct RefreshRotator {
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    issuer: TokenIssuer,
    clock: Arc<dyn Clock>,
}

impl RefreshRotator {
    /// Create a rotator
    #[must_use]
    pub fn new(
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        issuer: TokenIssuer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            refresh_tokens,
            issuer,
            clock,
        }
    }

    /// Consume `refresh_id` and issue its successor
    ///
    /// # Errors
    ///
    /// - [`Rejection::InvalidToken`] if the id is unknown or was consumed concurrently
    /// - [`Rejection::ExpiredToken`] if it had expired (it is deleted regardless)
    /// - store failures other than "not found", unchanged
    /// - any issuance failure; the presented token stays deleted
    pub async fn refresh(&self, refresh_id: &str) -> AuthResult<IssuedToken> {
        let token = match self.refresh_tokens.find(refresh_id).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => {
                debug!("unknown refresh token presented");
                return Err(Rejection::InvalidToken.into());
            }
            Err(e) => return Err(e.into()),
        };

        match self.refresh_tokens.delete(refresh_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                warn!(user_id = %token.user_id, "refresh token consumed concurrently");
                return Err(Rejection::InvalidToken.into());
            }
            Err(e) => return Err(e.into()),
        }

        let now = self.clock.now();
        if token.expires_at < now {
            info!(
                user_id = %token.user_id,
                expires_at = token.expires_at,
                "expired refresh token consumed"
            );
            return Err(Rejection::ExpiredToken.into());
        }

        let issued = self.issuer.issue(&token.user).await?;
        info!(user_id = %token.user_id, "refresh token rotated");
        Ok(issued)
    }
}
