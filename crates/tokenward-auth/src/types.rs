//! Core records and response types
//!
//! Users, in-flight sessions and refresh tokens are what the stores persist.
//! [`IssuedToken`] is the response returned after a sign-in or a refresh and is never stored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Local user record
///
/// `name` is the external identity (the provider email) and the natural key for
/// find-or-create. It never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque random id assigned at creation
    pub id: String,
    /// External identity
    pub name: String,
    /// Creation time (unix seconds)
    pub created_at: i64,
}

/// In-flight OAuth login, keyed by the code sent to the provider as `state`
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Session code
    pub id: String,
    /// Marshalled provider session
    pub value: String,
    /// Creation time (unix seconds)
    pub created_at: i64,
    /// Expiry time (unix seconds)
    pub expires_at: i64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &"[REDACTED]")
            .field("value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Single-use refresh token bound to a user
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// Token id, which is also the value handed to the client
    pub id: String,
    /// Id of the bound user
    pub user_id: String,
    /// Snapshot of the bound user, returned with every lookup
    pub user: User,
    /// Creation time (unix seconds)
    pub created_at: i64,
    /// Expiry time (unix seconds)
    pub expires_at: i64,
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshToken")
            .field("id", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Access and refresh token pair returned to the client
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Issuance time (unix seconds)
    pub issued_at: i64,
    /// Signed access token
    pub access: String,
    /// Access token expiry (unix seconds), equal to its `exp` claim
    pub access_expires: i64,
    /// Refresh token id
    pub refresh: String,
    /// Refresh token expiry (unix seconds)
    pub refresh_expires: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("issued_at", &self.issued_at)
            .field("access", &"[REDACTED]")
            .field("access_expires", &self.access_expires)
            .field("refresh", &"[REDACTED]")
            .field("refresh_expires", &self.refresh_expires)
            .finish()
    }
}

/// Query parameters the provider sent to the callback URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams(HashMap<String, String>);

impl CallbackParams {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<HashMap<String, String>> for CallbackParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(params)
    }
}

/// User profile as reported by the provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalProfile {
    /// Email address, used as the external identity
    pub email: Option<String>,
    /// Display name, if the provider has one
    pub name: Option<String>,
    /// Provider response as received
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl ExternalProfile {
    /// Build a profile from a userinfo response body
    #[must_use]
    pub fn from_raw(raw: serde_json::Map<String, serde_json::Value>) -> Self {
        let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let email = text("email");
        let name = text("name").or_else(|| text("login"));
        Self { email, name, raw }
    }
}

/// Extra JWT claims in the order the claims source returned them
pub type ExtraClaims = Vec<(String, serde_json::Value)>;
