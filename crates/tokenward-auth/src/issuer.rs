//! Access and refresh token issuance
//!
//! Every issuance reads the clock once and derives all timestamps from that value, so
//! `exp` inside the signed token equals `access_expires` in the response.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::claims::ClaimsProvider;
use crate::clock::{Clock, expires_after};
use crate::config::AuthConfig;
use crate::error::AuthResult;
use crate::generator::{REFRESH_TOKEN_LENGTH, TokenGenerator};
use crate::store::RefreshTokenStore;
use crate::types::{IssuedToken, RefreshToken, User};

/// Claims the engine always sets itself
const RESERVED_CLAIMS: [&str; 2] = ["sub", "exp"];

/// Mints a signed access token and a fresh refresh token for a user
#[derive(Clone)]
pub struct TokenIssuer {
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    claims: Arc<dyn ClaimsProvider>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    key: EncodingKey,
    algorithm: Algorithm,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("claims", &self.claims)
            .field("key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer using the key, algorithm and TTLs from `config`
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        claims: Arc<dyn ClaimsProvider>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            refresh_tokens,
            claims,
            generator,
            clock,
            key: EncodingKey::from_secret(config.secret_key.expose_secret().as_bytes()),
            algorithm: config.algorithm,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Issue a token pair for `user`
    ///
    /// The refresh token is stored before claims are fetched. If a later step fails the
    /// stored refresh token is never handed out and simply expires.
    ///
    /// # Errors
    ///
    /// A TTL overflowing the timestamp range, then generator, store, claims and signing
    /// failures, in that order.
    pub async fn issue(&self, user: &User) -> AuthResult<IssuedToken> {
        let now = self.clock.now();
        let access_expires = expires_after(now, self.access_ttl)?;

        let refresh = RefreshToken {
            id: self.generator.generate(REFRESH_TOKEN_LENGTH)?,
            user_id: user.id.clone(),
            user: user.clone(),
            created_at: now,
            expires_at: expires_after(now, self.refresh_ttl)?,
        };
        self.refresh_tokens.create(refresh.clone()).await?;

        let extra = self.claims.get_claims(&user.id).await?;

        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::String(user.name.clone()));
        claims.insert("exp".to_string(), Value::from(access_expires));
        for (key, value) in extra {
            if RESERVED_CLAIMS.contains(&key.as_str()) {
                warn!(
                    user_id = %user.id,
                    claim = %key,
                    "ignoring reserved claim from claims provider"
                );
                continue;
            }
            claims.insert(key, value);
        }

        let access = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.key)?;

        info!(
            user_id = %user.id,
            access_expires,
            refresh_expires = refresh.expires_at,
            "token issued"
        );

        Ok(IssuedToken {
            issued_at: now,
            access,
            access_expires,
            refresh: refresh.id,
            refresh_expires: refresh.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{NoClaims, StaticClaims};
    use crate::clock::ManualClock;
    use crate::error::AuthError;
    use crate::generator::SecureTokenGenerator;
    use crate::store::MemoryRefreshTokenStore;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde_json::json;

    const SECRET: &str = "issuer-test-secret";

    fn user() -> User {
        User {
            id: "user-1".into(),
            name: "jane@example.com".into(),
            created_at: 0,
        }
    }

    fn issuer(store: &MemoryRefreshTokenStore, claims: Arc<dyn ClaimsProvider>) -> TokenIssuer {
        TokenIssuer::new(
            &AuthConfig::new(SECRET),
            Arc::new(store.clone()),
            claims,
            Arc::new(SecureTokenGenerator::new()),
            Arc::new(ManualClock::new(1_000)),
        )
    }

    fn decode(token: &str) -> Map<String, Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[tokio::test]
    async fn test_issue_timestamps_and_claims() {
        let store = MemoryRefreshTokenStore::new();
        let token = issuer(&store, Arc::new(NoClaims)).issue(&user()).await.unwrap();

        assert_eq!(token.issued_at, 1_000);
        assert_eq!(token.access_expires, 1_300);
        assert_eq!(token.refresh_expires, 1_000 + 86_400);
        assert_eq!(token.refresh.len(), REFRESH_TOKEN_LENGTH);

        let claims = decode(&token.access);
        assert_eq!(claims["sub"], "jane@example.com");
        assert_eq!(claims["exp"], json!(token.access_expires));

        let stored = store.find(&token.refresh).await.unwrap();
        assert_eq!(stored.user, user());
        assert_eq!(stored.expires_at, token.refresh_expires);
    }

    #[tokio::test]
    async fn test_extra_claims_injected_verbatim() {
        let store = MemoryRefreshTokenStore::new();
        let claims = StaticClaims::new(vec![
            ("role".into(), json!("admin")),
            ("groups".into(), json!(["a", "b"])),
            ("sub".into(), json!("spoofed")),
        ]);
        let token = issuer(&store, Arc::new(claims)).issue(&user()).await.unwrap();

        let decoded = decode(&token.access);
        assert_eq!(decoded["role"], "admin");
        assert_eq!(decoded["groups"], json!(["a", "b"]));
        assert_eq!(decoded["sub"], "jane@example.com");
    }

    #[derive(Debug)]
    struct FailingClaims;

    #[async_trait::async_trait]
    impl ClaimsProvider for FailingClaims {
        async fn get_claims(&self, _user_id: &str) -> AuthResult<crate::types::ExtraClaims> {
            Err(AuthError::Claims("claims service down".into()))
        }
    }

    #[tokio::test]
    async fn test_claims_failure_aborts_issuance() {
        let store = MemoryRefreshTokenStore::new();
        let err = issuer(&store, Arc::new(FailingClaims))
            .issue(&user())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Claims(_)));
    }

    #[tokio::test]
    async fn test_overflowing_ttl_rejected_before_storing() {
        // GIVEN: An issuer built from an unvalidated config with a huge refresh TTL
        let store = MemoryRefreshTokenStore::new();
        let issuer = TokenIssuer::new(
            &AuthConfig::new(SECRET).with_refresh_ttl(i64::MAX),
            Arc::new(store.clone()),
            Arc::new(NoClaims),
            Arc::new(SecureTokenGenerator::new()),
            Arc::new(ManualClock::new(1_000)),
        );

        // WHEN/THEN: Issuance fails cleanly and nothing is persisted
        let err = issuer.issue(&user()).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
        assert!(store.is_empty().await);
    }
}
