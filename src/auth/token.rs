use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by the session cookie.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Session token, the key into the session store.
    pub sub: String,
    /// Expiration timestamp (seconds since epoch), equal to the session expiry.
    pub exp: usize,
}

/// Signs a cookie value for `session_token` that expires at `expires_at`.
///
/// Returns `AppError::InternalServerError` if encoding fails.
pub fn generate_token(
    session_token: &str,
    expires_at: DateTime<Utc>,
    secret: &str,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: session_token.to_string(),
        exp: expires_at.timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Failed to sign session cookie: {}", e)))
}

/// Verifies a cookie value and returns its claims.
///
/// Returns `AppError::Unauthorized` if the value is malformed, its signature is
/// invalid, or it has expired.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}
