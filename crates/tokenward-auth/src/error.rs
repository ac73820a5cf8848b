//! Error types for tokenward-auth
//!
//! The engine reports four families of failure:
//! - **Unauthorized**: the caller presented a session code or refresh token that is unknown
//!   or expired. The only family an adapter should turn into "401".
//! - **Provider**: the OAuth provider refused or failed a step of the handshake.
//! - **Store**: a persistence contract failed for a reason other than "not found".
//! - **Generation**: the entropy source was unavailable.
//!
//! Claims lookup, profile sync and token signing have their own variants so a caller can
//! tell them apart, but like every other failure they abort the operation immediately.

use thiserror::Error;

/// Result type for engine operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Why a presented credential was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No in-flight session exists for the presented code
    InvalidSession,
    /// The in-flight session exists but its TTL has elapsed
    SessionExpired,
    /// No refresh token exists for the presented id (never issued or already used)
    InvalidToken,
    /// The refresh token existed but had expired; it has been consumed anyway
    ExpiredToken,
}

impl Rejection {
    /// Human readable reason, safe to show to the caller
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidSession => "invalid session",
            Self::SessionExpired => "session expired",
            Self::InvalidToken => "invalid token",
            Self::ExpiredToken => "expired token",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Persistence failures reported by the store contracts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row exists for the requested key
    #[error("record not found")]
    NotFound,

    /// A row with the same key already exists
    #[error("record already exists: {0}")]
    Conflict(String),

    /// Any other backend failure
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Step of the provider handshake that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    /// Starting the login (building the provider session)
    BeginAuth,
    /// Reading the redirect URL from the provider session
    AuthUrl,
    /// Restoring a provider session from its stored form
    UnmarshalSession,
    /// Exchanging the callback parameters for provider credentials
    Authorize,
    /// Fetching the external user profile
    FetchUser,
}

impl ProviderOperation {
    /// Context prefix used in error messages
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::BeginAuth => "provider begin auth failed",
            Self::AuthUrl => "unable to get auth url",
            Self::UnmarshalSession => "provider session corrupt",
            Self::Authorize => "provider authorization rejected",
            Self::FetchUser => "profile fetch from provider failed",
        }
    }
}

/// Failure of a provider capability, tagged with the step that failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", .operation.describe())]
pub struct ProviderError {
    /// Which step of the handshake failed
    pub operation: ProviderOperation,
    /// Provider supplied detail
    pub message: String,
}

impl ProviderError {
    /// Create a provider error for the given step
    pub fn new(operation: ProviderOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Main error type for tokenward-auth
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthError {
    /// Presented session code or refresh token was rejected
    #[error("unauthorized: {0}")]
    Unauthorized(Rejection),

    /// OAuth provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Persistence failure other than "not found"
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Entropy source unavailable
    #[error("token generation failed: {0}")]
    Generation(String),

    /// Claims lookup failed
    #[error("claims lookup failed: {0}")]
    Claims(String),

    /// Downstream profile sync failed
    #[error("profile sync failed: {0}")]
    ProfileSync(String),

    /// Access token signing failed
    #[error("jwt encoding failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// No provider registered under the requested name
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// True for failures caused by the credential the caller presented
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The rejection reason, if this is an authorization failure
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Unauthorized(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Stable error code for API responses and logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(Rejection::InvalidSession) => "INVALID_SESSION",
            Self::Unauthorized(Rejection::SessionExpired) => "SESSION_EXPIRED",
            Self::Unauthorized(Rejection::InvalidToken) => "INVALID_TOKEN",
            Self::Unauthorized(Rejection::ExpiredToken) => "EXPIRED_TOKEN",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Claims(_) => "CLAIMS_ERROR",
            Self::ProfileSync(_) => "PROFILE_SYNC_ERROR",
            Self::Signing(_) => "SIGNING_ERROR",
            Self::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

impl From<Rejection> for AuthError {
    fn from(reason: Rejection) -> Self {
        Self::Unauthorized(reason)
    }
}
