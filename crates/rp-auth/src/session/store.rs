//! Session storage trait and in-memory implementation.
//!
//! # Implementation Notes
//!
//! Implementations own concurrency control. Two callbacks racing on the
//! same session must not interleave their writes; the in-memory store
//! serializes all access behind one lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Session;

/// Storage trait for user sessions.
///
/// The callback never creates or destroys sessions: it loads an existing
/// session, works on a copy, and saves the copy back only when the whole
/// pipeline succeeded.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session by id.
    ///
    /// Returns `None` if no session exists for the id.
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError>;

    /// Replaces the stored state of an existing session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::NotFound`] if the session no longer exists.
    async fn save(&self, session_id: &str, session: &Session) -> Result<(), SessionStoreError>;
}

/// Error type for session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    /// Session not found.
    #[error("Session not found")]
    NotFound,

    /// The backing store is unavailable.
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// In-memory session store.
///
/// Sessions are created through [`InMemorySessionStore::insert`], which
/// stands in for whatever component starts the authentication flow.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a session.
    pub async fn insert(&self, session_id: impl Into<String>, session: Session) {
        self.sessions.write().await.insert(session_id.into(), session);
    }

    /// Returns a snapshot of a session.
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Returns the number of sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.get(session_id).await)
    }

    async fn save(&self, session_id: &str, session: &Session) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(session_id)
            .ok_or(SessionStoreError::NotFound)?;
        *slot = session.clone();
        Ok(())
    }
}
