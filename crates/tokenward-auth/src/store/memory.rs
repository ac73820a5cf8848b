//! In-memory stores
//!
//! Thread-safe stores backed by `Arc<RwLock<HashMap>>`. Deletes take the write lock, so
//! of several concurrent deletes of one key exactly one observes the row. That is the
//! serialization the refresh rotation protocol needs. Data does not survive a restart.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RefreshTokenStore, SessionStore, StoreResult, UserStore};
use crate::error::StoreError;
use crate::types::{RefreshToken, Session, User};

/// Keyed table shared by all memory stores
#[derive(Debug)]
struct Table<V> {
    rows: Arc<RwLock<HashMap<String, V>>>,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<V> Clone for Table<V> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<V: Clone> Table<V> {
    async fn insert_new(&self, key: String, value: V) -> StoreResult<()> {
        match self.rows.write().await.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Conflict("duplicate key".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> StoreResult<V> {
        self.rows
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.rows
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

/// In-memory [`SessionStore`]
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Table<Session>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.len().await
    }

    /// True if no sessions are stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> StoreResult<()> {
        self.sessions.insert_new(session.id.clone(), session).await
    }

    async fn find(&self, id: &str) -> StoreResult<Session> {
        self.sessions.get(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.sessions.remove(id).await
    }
}

/// In-memory [`RefreshTokenStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Table<RefreshToken>,
}

impl MemoryRefreshTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live refresh tokens
    pub async fn len(&self) -> usize {
        self.tokens.len().await
    }

    /// True if no refresh tokens are stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, token: RefreshToken) -> StoreResult<()> {
        self.tokens.insert_new(token.id.clone(), token).await
    }

    async fn find(&self, id: &str) -> StoreResult<RefreshToken> {
        self.tokens.get(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.tokens.remove(id).await
    }
}

/// In-memory [`UserStore`], keyed by external identity
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Table<User>,
}

impl MemoryUserStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users
    pub async fn len(&self) -> usize {
        self.users.len().await
    }

    /// True if no users exist
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, name: &str) -> StoreResult<User> {
        self.users.get(name).await
    }

    async fn create(&self, user: User) -> StoreResult<()> {
        self.users.insert_new(user.name.clone(), user).await
    }
}
