//! Engine configuration
//!
//! [`AuthConfig`] holds the signing key, the three TTLs and the two policy switches.
//! It deserializes from any serde source; missing fields take the defaults below.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Default access token lifetime (5 minutes)
pub const DEFAULT_ACCESS_TTL: i64 = 300;

/// Default refresh token lifetime (24 hours)
pub const DEFAULT_REFRESH_TTL: i64 = 86_400;

/// Default lifetime of an in-flight login (1 hour)
pub const DEFAULT_CODE_TTL: i64 = 3_600;

/// Longest accepted TTL (10 years)
pub const MAX_TTL: i64 = 10 * 365 * 86_400;

/// Request timeout for provider, claims and profile HTTP calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// What happens to the in-flight session when its callback arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// The session is deleted before its expiry is checked, so a code signs in at most once
    #[default]
    SingleUse,
    /// The session stays until it expires; the same code may complete several sign-ins
    Reusable,
}

/// How a failing profile sync affects sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSyncPolicy {
    /// Sync failure fails the sign-in
    #[default]
    Required,
    /// Sync failure is logged and sign-in continues
    BestEffort,
}

/// Engine configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for access tokens
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub secret_key: SecretString,
    /// Signing algorithm (HS256, HS384 or HS512)
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl: i64,
    /// In-flight login lifetime in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl: i64,
    /// Session consumption at callback
    #[serde(default)]
    pub session_policy: SessionPolicy,
    /// Profile sync failure handling
    #[serde(default)]
    pub profile_sync_policy: ProfileSyncPolicy,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("code_ttl", &self.code_ttl)
            .field("session_policy", &self.session_policy)
            .field("profile_sync_policy", &self.profile_sync_policy)
            .finish()
    }
}

impl AuthConfig {
    /// Configuration with default TTLs and policies
    #[must_use]
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::new(secret_key.into()),
            algorithm: default_algorithm(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            code_ttl: DEFAULT_CODE_TTL,
            session_policy: SessionPolicy::default(),
            profile_sync_policy: ProfileSyncPolicy::default(),
        }
    }

    /// Set the signing algorithm
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the access token lifetime
    #[must_use]
    pub fn with_access_ttl(mut self, secs: i64) -> Self {
        self.access_ttl = secs;
        self
    }

    /// Set the refresh token lifetime
    #[must_use]
    pub fn with_refresh_ttl(mut self, secs: i64) -> Self {
        self.refresh_ttl = secs;
        self
    }

    /// Set the in-flight login lifetime
    #[must_use]
    pub fn with_code_ttl(mut self, secs: i64) -> Self {
        self.code_ttl = secs;
        self
    }

    /// Set the session policy
    #[must_use]
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Set the profile sync policy
    #[must_use]
    pub fn with_profile_sync_policy(mut self, policy: ProfileSyncPolicy) -> Self {
        self.profile_sync_policy = policy;
        self
    }

    /// Check the configuration before use
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for an empty secret, a non-HMAC algorithm or a
    /// TTL outside `1..=MAX_TTL`.
    pub fn validate(&self) -> AuthResult<()> {
        if self.secret_key.expose_secret().is_empty() {
            return Err(AuthError::Configuration(
                "secret key must not be empty".to_string(),
            ));
        }
        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(format!(
                "unsupported signing algorithm {:?}, expected HS256, HS384 or HS512",
                self.algorithm
            )));
        }
        for (name, ttl) in [
            ("access_ttl", self.access_ttl),
            ("refresh_ttl", self.refresh_ttl),
            ("code_ttl", self.code_ttl),
        ] {
            if ttl <= 0 {
                return Err(AuthError::Configuration(format!(
                    "{name} must be positive, got {ttl}"
                )));
            }
            if ttl > MAX_TTL {
                return Err(AuthError::Configuration(format!(
                    "{name} must be at most {MAX_TTL} seconds, got {ttl}"
                )));
            }
        }
        Ok(())
    }
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_access_ttl() -> i64 {
    DEFAULT_ACCESS_TTL
}

fn default_refresh_ttl() -> i64 {
    DEFAULT_REFRESH_TTL
}

fn default_code_ttl() -> i64 {
    DEFAULT_CODE_TTL
}

// Custom serialization for SecretString
pub(crate) fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

// Custom deserialization for SecretString
pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}
