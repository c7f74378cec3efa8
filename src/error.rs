//!
//! # Custom Error Handling
//!
//! This module defines the `AppError` type returned by handlers, gates and
//! collaborators. It implements `actix_web::error::ResponseError`, so an error
//! raised anywhere below the router turns into an HTTP response with a JSON body.
//!
//! `From` implementations exist for the third-party errors the crate meets
//! (`sqlx`, `validator`, `jsonwebtoken`, `reqwest`, `serde_json`), which keeps
//! handlers on the `?` operator.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Field name to the list of messages for that field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Represents all possible errors that can occur while serving a request.
#[derive(Debug)]
pub enum AppError {
    /// Authentication is required but missing or invalid (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but the session lacks a required property (HTTP 403).
    Forbidden(String),
    /// Malformed request, e.g. a body that is not JSON (HTTP 400).
    BadRequest(String),
    /// No route, or the addressed resource does not exist (HTTP 404).
    NotFound(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure reported by the persistence layer (HTTP 500).
    /// The message is logged but never sent to the client.
    DatabaseError(String),
    /// Input failed validation (HTTP 422). Carries per-field messages.
    ValidationError(FieldErrors),
    /// The OAuth round trip failed: state mismatch, provider error or code
    /// exchange failure (HTTP 400).
    OAuthError(String),
}

impl AppError {
    /// Builds a `ValidationError` holding a single message for one field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        AppError::ValidationError(errors)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(errors) => {
                let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
                write!(f, "Validation Error: invalid fields [{}]", fields.join(", "))
            }
            AppError::OAuthError(msg) => write!(f, "OAuth Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::OAuthError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::ValidationError(errors) => HttpResponse::build(status).json(json!({
                "error": "The given data was invalid.",
                "errors": errors
            })),
            AppError::DatabaseError(msg) => {
                log::error!("database failure: {}", msg);
                HttpResponse::build(status).json(json!({
                    "error": "Database error"
                }))
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::OAuthError(msg) => HttpResponse::build(status).json(json!({
                "error": msg
            })),
        }
    }
}

/// `RowNotFound` becomes `NotFound`; everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Keeps every field's messages, falling back to the validator code when a
/// rule carries no message.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        let mut fields = FieldErrors::new();
        for (field, errors) in error.field_errors() {
            let messages = errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::ValidationError(fields)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

/// Outbound HTTP is only used to talk to the OAuth provider.
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> AppError {
        AppError::OAuthError(format!("provider request failed: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> AppError {
        AppError::BadRequest(format!("Malformed JSON: {}", error))
    }
}
