//! Server-side sessions and the store that holds them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;

/// Where a session sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Verified,
}

/// Server-side record of who a client is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque token, the key in the store and the `sub` of the cookie JWT.
    pub token: String,
    pub user_id: Option<i32>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Starts a session for `user_id` with a fresh token.
    pub fn start(user_id: i32, verified: bool, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            user_id: Some(user_id),
            verified,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        match self.user_id {
            Some(_) if self.is_expired(now) => SessionState::Anonymous,
            Some(_) if self.verified => SessionState::Verified,
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        }
    }
}

/// Storage for sessions, keyed by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<Session>, AppError>;

    /// Inserts or replaces a session. Tokens that were invalidated are refused.
    async fn set(&self, session: Session) -> Result<(), AppError>;

    /// Removes the session. Unknown tokens are not an error.
    async fn invalidate(&self, token: &str) -> Result<(), AppError>;

    /// Removes every session belonging to `user_id`, returning how many were dropped.
    async fn invalidate_user(&self, user_id: i32) -> Result<usize, AppError>;
}

#[derive(Default)]
struct Sessions {
    live: HashMap<String, Session>,
    /// Invalidated tokens, kept until the session would have expired anyway.
    revoked: HashMap<String, DateTime<Utc>>,
}

/// Process-local `SessionStore`.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Sessions>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops sessions that expired before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.live.len();
        inner.live.retain(|_, session| !session.is_expired(now));
        inner.revoked.retain(|_, expires_at| *expires_at > now);
        before - inner.live.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, token: &str) -> Result<Option<Session>, AppError> {
        Ok(self.inner.read().await.live.get(token).cloned())
    }

    async fn set(&self, session: Session) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner.revoked.contains_key(&session.token) {
            return Err(AppError::Unauthorized("Session has been invalidated".into()));
        }
        inner.live.insert(session.token.clone(), session);
        Ok(())
    }

    async fn invalidate(&self, token: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let expires_at = inner
            .live
            .remove(token)
            .map(|s| s.expires_at)
            .unwrap_or_else(Utc::now);
        inner.revoked.insert(token.to_string(), expires_at);
        Ok(())
    }

    async fn invalidate_user(&self, user_id: i32) -> Result<usize, AppError> {
        let mut inner = self.inner.write().await;
        let tokens: Vec<String> = inner
            .live
            .values()
            .filter(|s| s.user_id == Some(user_id))
            .map(|s| s.token.clone())
            .collect();
        for token in &tokens {
            if let Some(session) = inner.live.remove(token) {
                inner.revoked.insert(token.clone(), session.expires_at);
            }
        }
        Ok(tokens.len())
    }
}
