use async_trait::async_trait;
use sqlx::PgPool;

use super::{email_taken, UserRepository};
use crate::error::AppError;
use crate::models::{OAuthIdentity, ProfileUpdate, User};

const USER_COLUMNS: &str =
    "id, name, email, google_id, avatar, email_verified, created_at, updated_at";

/// `UserRepository` backed by the `users` table (see `migrations/`).
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique violations on `users.email` surface as a field error.
fn map_write_error(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => email_taken(),
        _ => error.into(),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_user(&self, id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_or_create_oauth_user(&self, identity: &OAuthIdentity) -> Result<User, AppError> {
        let linked = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET avatar = COALESCE($2, avatar),
                 email_verified = email_verified OR ($3 AND email = $4),
                 updated_at = NOW()
             WHERE google_id = $1
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&identity.subject)
        .bind(&identity.picture)
        .bind(identity.email_verified)
        .bind(identity.email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = linked {
            return Ok(user);
        }

        // Either links the account registered under this email or creates one.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, google_id, avatar, email_verified)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email) DO UPDATE
             SET google_id = EXCLUDED.google_id,
                 avatar = COALESCE(EXCLUDED.avatar, users.avatar),
                 email_verified = users.email_verified OR EXCLUDED.email_verified,
                 updated_at = NOW()
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(identity.display_name())
        .bind(identity.email.to_lowercase())
        .bind(&identity.subject)
        .bind(&identity.picture)
        .bind(identity.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(user)
    }

    async fn update_user(
        &self,
        id: i32,
        changes: &ProfileUpdate,
    ) -> Result<Option<User>, AppError> {
        let name = changes.name.as_ref().map(|n| n.trim().to_string());
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET name = COALESCE($1::text, name),
                 email_verified = CASE
                     WHEN $2::text IS NOT NULL AND $2::text <> email THEN FALSE
                     ELSE email_verified
                 END,
                 email = COALESCE($2::text, email),
                 updated_at = NOW()
             WHERE id = $3
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(changes.normalized_email())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(user)
    }

    async fn delete_user(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotenv::dotenv;

    /// Connects to `DATABASE_URL` and applies the migrations; `None` without a database.
    async fn repository() -> Option<PgUserRepository> {
        dotenv().ok();
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url)
            .await
            .expect("Failed to connect to test DB");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        Some(PgUserRepository::new(pool))
    }

    #[actix_rt::test]
    async fn test_returning_google_user_becomes_verified() {
        let Some(repo) = repository().await else {
            return;
        };
        let _ = sqlx::query("DELETE FROM users WHERE google_id = $1 OR email = $2")
            .bind("pg-verify-sub")
            .bind("pg-verify@example.com")
            .execute(&repo.pool)
            .await;

        let mut identity = OAuthIdentity {
            subject: "pg-verify-sub".into(),
            email: "pg-verify@example.com".into(),
            email_verified: false,
            name: Some("Pg Verify".into()),
            picture: None,
        };
        let created = repo.find_or_create_oauth_user(&identity).await.unwrap();
        assert!(!created.email_verified);

        identity.email_verified = true;
        let again = repo.find_or_create_oauth_user(&identity).await.unwrap();
        assert_eq!(again.id, created.id);
        assert!(again.email_verified);

        assert!(repo.delete_user(created.id).await.unwrap());
    }
}
