//! # Tokenward Auth - OAuth Sign-in and Token Rotation Engine
//!
//! Turns a third-party OAuth login into a locally issued, short-lived signed access token
//! plus a long-lived, single-use refresh token, resolving or creating the local user on
//! the way.
//!
//! ## Lifecycle
//!
//! 1. [`AuthService::start_oauth`] stores an in-flight [`Session`] under a random code and
//!    returns the provider redirect URL (the code travels as `state`).
//! 2. [`AuthService::sign_in`] checks the code, lets the provider exchange the callback
//!    parameters, resolves the external email to a local [`User`] and issues an
//!    [`IssuedToken`].
//! 3. [`AuthService::refresh`] deletes the presented refresh token and, if it had not
//!    expired, issues a brand-new pair.
//!
//! ## Architecture
//!
//! - [`error`] - Error taxonomy (`AuthError`, `Rejection`, `StoreError`, `ProviderError`)
//! - [`types`] - Records and the response type
//! - [`config`] - Signing key, TTLs and policies
//! - [`clock`] / [`generator`] - Injected time and entropy
//! - [`store`] - Persistence contracts and in-memory stores
//! - [`providers`] - OAuth provider capability, registry and the `oauth2` implementation
//! - [`session`] - Login start and session validation
//! - [`user`] - User fetch and find-or-create
//! - [`claims`] / [`profile`] - Optional claims lookup and profile sync
//! - [`issuer`] / [`refresh`] - Token issuance and rotation
//! - [`service`] - The `AuthService` facade
//!
//! ## Quick Start
//!
//! ```rust
//! use tokenward_auth::{AuthConfig, AuthService};
//!
//! # tokio_test::block_on(async {
//! let service = AuthService::builder(AuthConfig::new("signing-key")).build()?;
//!
//! // Unknown refresh tokens are rejected as unauthorized
//! let err = service.refresh("not-a-token").await.unwrap_err();
//! assert!(err.is_unauthorized());
//! # Ok::<(), tokenward_auth::AuthError>(())
//! # }).unwrap();
//! ```

pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod issuer;
pub mod profile;
pub mod providers;
pub mod refresh;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod user;

pub use claims::{ClaimsProvider, HttpClaimsProvider, NoClaims, StaticClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ProfileSyncPolicy, SessionPolicy};
pub use error::{
    AuthError, AuthResult, ProviderError, ProviderOperation, Rejection, StoreError,
};
pub use generator::{SecureTokenGenerator, TokenGenerator};
pub use issuer::TokenIssuer;
pub use profile::{HttpProfileSyncer, NoopProfileSyncer, ProfileSyncer};
pub use providers::{
    OAuth2Provider, OAuth2ProviderConfig, OAuthProvider, ProviderPreset, ProviderRegistry,
    ProviderSession,
};
pub use refresh::RefreshRotator;
pub use service::{AuthService, AuthServiceBuilder};
pub use session::{OAuthStarter, SessionValidator};
pub use store::{
    MemoryRefreshTokenStore, MemorySessionStore, MemoryUserStore, RefreshTokenStore,
    SessionStore, UserStore,
};
pub use types::{
    CallbackParams, ExternalProfile, ExtraClaims, IssuedToken, RefreshToken, Session, User,
};
pub use user::{UserFetcher, UserResolver};

// Re-export so callers can pick a signing algorithm without a direct dependency
pub use jsonwebtoken::Algorithm;
