//! Persistence contracts
//!
//! The engine needs three narrow stores. Implementations must report a missing row as
//! [`StoreError::NotFound`] and nothing else, because the engine branches on it.
//!
//! # Concurrency
//!
//! For a given refresh token id, `find` followed by `delete` must behave as if serialized
//! with any concurrent `find`/`delete` on the same id. Concretely, when two callers race to
//! delete the same row, exactly one `delete` returns `Ok(())` and the other returns
//! [`StoreError::NotFound`]. The rotation protocol relies on this to stay single-use.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{RefreshToken, Session, User};

pub mod memory;

pub use memory::{MemoryRefreshTokenStore, MemorySessionStore, MemoryUserStore};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for in-flight OAuth sessions
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Persist a new session. Fails with [`StoreError::Conflict`] if the id exists.
    async fn create(&self, session: Session) -> StoreResult<()>;

    /// Look up a session by code
    async fn find(&self, id: &str) -> StoreResult<Session>;

    /// Remove a session. Fails with [`StoreError::NotFound`] if it is already gone.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Storage for refresh tokens
#[async_trait]
pub trait RefreshTokenStore: Send + Sync + std::fmt::Debug {
    /// Persist a new token. Fails with [`StoreError::Conflict`] if the id exists.
    async fn create(&self, token: RefreshToken) -> StoreResult<()>;

    /// Look up a token together with its bound user
    async fn find(&self, id: &str) -> StoreResult<RefreshToken>;

    /// Remove a token. Exactly one of several concurrent deletes of the same id succeeds.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Storage for local users
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Look up a user by external identity
    async fn find(&self, name: &str) -> StoreResult<User>;

    /// Persist a new user. Fails with [`StoreError::Conflict`] if the name is taken.
    async fn create(&self, user: User) -> StoreResult<()>;
}
