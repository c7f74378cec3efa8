use crate::{
    db::{email_taken, UserRepository},
    error::AppError,
    models::{ProfileUpdate, User},
    session::{Session, SessionStore},
};

fn user_id(session: &Session) -> Result<i32, AppError> {
    session
        .user_id
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))
}

/// The signed-in user's profile.
///
/// ## Responses:
/// - `200 OK` with the `User` as JSON.
/// - `404 Not Found` if the user no longer exists.
pub async fn edit(users: &dyn UserRepository, session: &Session) -> Result<User, AppError> {
    users
        .find_user(user_id(session)?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Merges the JSON body into the signed-in user's profile.
///
/// Only `name` and `email` may be sent. Nothing is written unless the whole body
/// is valid.
///
/// ## Responses:
/// - `200 OK` with the updated `User`.
/// - `400 Bad Request` if the body is not a JSON object.
/// - `422 Unprocessable Entity` for unknown fields, invalid values or an email
///   already used by another account.
/// - `404 Not Found` if the user no longer exists.
pub async fn update(
    users: &dyn UserRepository,
    session: &Session,
    body: &[u8],
) -> Result<User, AppError> {
    let id = user_id(session)?;
    let changes = ProfileUpdate::from_json(body)?;
    if changes.is_empty() {
        return edit(users, session).await;
    }

    // Also enforced by the repository on write.
    if let Some(email) = changes.normalized_email() {
        if let Some(owner) = users.find_by_email(&email).await? {
            if owner.id != id {
                return Err(email_taken());
            }
        }
    }

    let user = users
        .update_user(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    log::info!("user {} updated their profile", id);
    Ok(user)
}

/// Deletes the signed-in user and every session they hold.
///
/// The calling session is invalidated even when the user was already gone, in
/// which case the result is `NotFound`.
pub async fn destroy(
    users: &dyn UserRepository,
    sessions: &dyn SessionStore,
    session: &Session,
) -> Result<(), AppError> {
    let id = user_id(session)?;
    let deleted = users.delete_user(id).await?;

    sessions.invalidate(&session.token).await?;
    let dropped = sessions.invalidate_user(id).await?;

    if deleted {
        log::info!("user {} deleted their account ({} other sessions ended)", id, dropped);
        Ok(())
    } else {
        Err(AppError::NotFound("User not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryUserRepository;
    use crate::session::InMemorySessionStore;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[actix_rt::test]
    async fn test_update_then_edit_reflects_changes() {
        let users = InMemoryUserRepository::new();
        let ada = users.insert("Ada", "ada@example.com", true).await;
        let session = Session::start(ada.id, true, Duration::minutes(5));

        let updated = update(&users, &session, br#"{"name": "Ada Lovelace"}"#)
            .await
            .unwrap();
        let fetched = edit(&users, &session).await.unwrap();

        assert_eq!(fetched, updated);
        assert_eq!(fetched.name, "Ada Lovelace");
        assert_eq!(fetched.email, ada.email);
        assert!(fetched.email_verified);
    }

    #[actix_rt::test]
    async fn test_invalid_update_leaves_user_untouched() {
        let users = InMemoryUserRepository::new();
        let ada = users.insert("Ada", "ada@example.com", true).await;
        let session = Session::start(ada.id, true, Duration::minutes(5));

        let result = update(&users, &session, br#"{"name": "", "email": "new@example.com"}"#).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(edit(&users, &session).await.unwrap(), ada);
    }

    #[actix_rt::test]
    async fn test_update_to_taken_email_is_a_field_error() {
        let users = InMemoryUserRepository::new();
        let ada = users.insert("Ada", "ada@example.com", true).await;
        users.insert("Grace", "grace@example.com", true).await;
        let session = Session::start(ada.id, true, Duration::minutes(5));

        match update(&users, &session, br#"{"email": "grace@example.com"}"#).await {
            Err(AppError::ValidationError(fields)) => assert!(fields.contains_key("email")),
            other => panic!("unexpected result: {:?}", other),
        }

        // Re-sending your own email is not a conflict
        let same = update(&users, &session, br#"{"email": "ada@example.com"}"#)
            .await
            .unwrap();
        assert!(same.email_verified);
    }

    #[actix_rt::test]
    async fn test_destroy_twice() {
        let users = InMemoryUserRepository::new();
        let sessions = InMemorySessionStore::new();
        let ada = users.insert("Ada", "ada@example.com", true).await;
        let session = Session::start(ada.id, true, Duration::minutes(5));
        let other_device = Session::start(ada.id, true, Duration::minutes(5));
        sessions.set(session.clone()).await.unwrap();
        sessions.set(other_device.clone()).await.unwrap();

        destroy(&users, &sessions, &session).await.unwrap();
        assert!(users.find_user(ada.id).await.unwrap().is_none());
        assert!(sessions.is_empty().await);

        assert!(matches!(
            destroy(&users, &sessions, &session).await,
            Err(AppError::NotFound(_))
        ));
    }
}
