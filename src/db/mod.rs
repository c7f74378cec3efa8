//! The persistence collaborator: where users live.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{OAuthIdentity, ProfileUpdate, User};

pub use memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;

/// User storage as seen by the handlers.
///
/// Implementations apply each mutation atomically: a failed call leaves the
/// user untouched.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Returns the user linked to the provider identity.
    ///
    /// Looks up by provider subject first, then links an existing account with
    /// the same email, and creates a new user otherwise. A verified email from
    /// the provider marks the user as verified.
    async fn find_or_create_oauth_user(&self, identity: &OAuthIdentity) -> Result<User, AppError>;

    /// Merges `changes` into the user. `Ok(None)` when the user does not exist.
    async fn update_user(&self, id: i32, changes: &ProfileUpdate)
        -> Result<Option<User>, AppError>;

    /// Deletes the user, returning whether a row was removed.
    async fn delete_user(&self, id: i32) -> Result<bool, AppError>;
}

pub(crate) fn email_taken() -> AppError {
    AppError::validation("email", "The email has already been taken.")
}
