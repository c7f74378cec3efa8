use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::error::{AppError, FieldErrors};

lazy_static! {
    // At least one character that is not whitespace.
    static ref NOT_BLANK: regex::Regex = regex::Regex::new(r"\S").unwrap();
}

/// A user as stored by the persistence layer and returned by `GET /profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Applies `changes` on top of the current fields.
    ///
    /// A changed email address is no longer verified.
    pub fn apply(&mut self, changes: &ProfileUpdate) {
        if let Some(name) = &changes.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = &changes.email {
            let email = email.trim().to_string();
            if email != self.email {
                self.email = email;
                self.email_verified = false;
            }
        }
        self.updated_at = Utc::now();
    }
}

/// Identity returned by the OAuth provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthIdentity {
    /// Provider-side stable user id (`sub`).
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl OAuthIdentity {
    /// Display name for a newly created user.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// The mutable subset of a user's profile, as accepted by `PATCH /profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(
        length(min = 1, max = 255, message = "The name must be between 1 and 255 characters."),
        custom = "not_blank"
    )]
    pub name: Option<String>,

    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email may not be greater than 255 characters."),
        custom = "lowercase"
    )]
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Parses and validates a request body.
    ///
    /// Bodies that are not a JSON object are a `BadRequest`; unknown keys,
    /// wrongly typed values and rule violations are a `ValidationError`.
    pub fn from_json(body: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(body)?;
        let object = match value {
            Value::Object(object) => object,
            _ => return Err(AppError::BadRequest("Expected a JSON object".into())),
        };

        let update = Self::from_object(object)?;
        update.validate()?;
        Ok(update)
    }

    fn from_object(object: Map<String, Value>) -> Result<Self, AppError> {
        let mut errors = FieldErrors::new();
        let mut update = ProfileUpdate::default();

        for (key, value) in object {
            let slot = match key.as_str() {
                "name" => Some(&mut update.name),
                "email" => Some(&mut update.email),
                _ => None,
            };
            let Some(slot) = slot else {
                errors
                    .entry(key)
                    .or_default()
                    .push("This field cannot be changed.".into());
                continue;
            };
            match value {
                Value::String(s) => *slot = Some(s),
                Value::Null => {}
                _ => errors
                    .entry(key)
                    .or_default()
                    .push("The value must be a string.".into()),
            }
        }

        if errors.is_empty() {
            Ok(update)
        } else {
            Err(AppError::ValidationError(errors))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Email in the form it will be stored.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.trim().to_string())
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if NOT_BLANK.is_match(value) {
        Ok(())
    } else {
        let mut error = ValidationError::new("blank");
        error.message = Some("The name field is required.".into());
        Err(error)
    }
}

// Emails are stored as sent, so mixed case is refused rather than rewritten.
fn lowercase(value: &str) -> Result<(), ValidationError> {
    if value == value.to_lowercase() {
        Ok(())
    } else {
        let mut error = ValidationError::new("lowercase");
        error.message = Some("The email must be lowercase.".into());
        Err(error)
    }
}
