use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{email_taken, UserRepository};
use crate::error::AppError;
use crate::models::{OAuthIdentity, ProfileUpdate, User};

#[derive(Default)]
struct Users {
    next_id: i32,
    rows: BTreeMap<i32, User>,
}

impl Users {
    fn by_email(&self, email: &str) -> Option<&User> {
        self.rows.values().find(|u| u.email == email)
    }
}

/// `UserRepository` kept in process memory. Used when no database is configured
/// and by the tests.
#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Users>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user directly, assigning the next id.
    pub async fn insert(&self, name: &str, email: &str, email_verified: bool) -> User {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_id,
            name: name.to_string(),
            email: email.to_lowercase(),
            google_id: None,
            avatar: None,
            email_verified,
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(user.id, user.clone());
        user
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.rows.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_lowercase();
        Ok(self.inner.read().await.by_email(&email).cloned())
    }

    async fn find_or_create_oauth_user(&self, identity: &OAuthIdentity) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        let email = identity.email.to_lowercase();

        let existing = inner
            .rows
            .values()
            .find(|u| u.google_id.as_deref() == Some(identity.subject.as_str()))
            .or_else(|| inner.by_email(&email))
            .map(|u| u.id);

        if let Some(id) = existing {
            let user = inner
                .rows
                .get_mut(&id)
                .ok_or_else(|| AppError::InternalServerError("user vanished".into()))?;
            user.google_id = Some(identity.subject.clone());
            if identity.picture.is_some() {
                user.avatar = identity.picture.clone();
            }
            user.email_verified |= identity.email_verified && user.email == email;
            user.updated_at = Utc::now();
            return Ok(user.clone());
        }

        inner.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_id,
            name: identity.display_name(),
            email,
            google_id: Some(identity.subject.clone()),
            avatar: identity.picture.clone(),
            email_verified: identity.email_verified,
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i32,
        changes: &ProfileUpdate,
    ) -> Result<Option<User>, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = changes.normalized_email() {
            if inner.by_email(&email).is_some_and(|u| u.id != id) {
                return Err(email_taken());
            }
        }
        Ok(inner.rows.get_mut(&id).map(|user| {
            user.apply(changes);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AppError> {
        Ok(self.inner.write().await.rows.remove(&id).is_some())
    }
}
