//! OAuth 2.0 authorization-code login against Google.
//!
//! `OAuthProvider` is the seam the handlers talk to: it builds the authorization
//! URL and exchanges the returned code for the user's identity. `NonceStore`
//! remembers the `state` values that were handed out so a callback can only
//! complete a flow this server started.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::GoogleConfig;
use crate::error::AppError;
use crate::models::OAuthIdentity;

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to, carrying `state` back on the callback.
    fn authorization_url(&self, state: &str) -> Url;

    /// Trades an authorization code for the signed-in user's identity.
    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, AppError>;
}

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

lazy_static! {
    static ref GOOGLE_AUTH: Url = Url::parse(GOOGLE_AUTH_URL).unwrap();
}
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleProvider {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> Url {
        let mut url = GOOGLE_AUTH.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, AppError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::warn!("google token exchange rejected with {}", status);
            return Err(AppError::OAuthError(format!(
                "code exchange failed with status {}",
                status
            )));
        }
        let token: TokenResponse = response.json().await?;

        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(OAuthIdentity {
            subject: info.sub,
            email: info.email,
            email_verified: info.email_verified,
            name: info.name,
            picture: info.picture,
        })
    }
}

/// Issued `state` values and when they stop being accepted.
pub struct NonceStore {
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
    lifetime: Duration,
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

impl NonceStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            issued: Mutex::new(HashMap::new()),
            lifetime,
        }
    }

    /// Generates and records a fresh nonce.
    pub fn issue(&self) -> Result<String, AppError> {
        let nonce = Uuid::new_v4().simple().to_string();
        self.lock()?
            .insert(nonce.clone(), Utc::now() + self.lifetime);
        Ok(nonce)
    }

    /// Removes `nonce`, returning true if it was issued and has not expired.
    pub fn consume(&self, nonce: &str) -> Result<bool, AppError> {
        let expires_at = self.lock()?.remove(nonce);
        Ok(matches!(expires_at, Some(at) if Utc::now() < at))
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut issued = self.lock()?;
        let before = issued.len();
        issued.retain(|_, expires_at| now < *expires_at);
        Ok(before - issued.len())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>>, AppError> {
        self.issued
            .lock()
            .map_err(|_| AppError::InternalServerError("nonce store lock poisoned".into()))
    }
}
