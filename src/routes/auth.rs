use crate::{
    auth::{generate_token, NonceStore, OAuthProvider},
    config::SessionConfig,
    db::UserRepository,
    error::AppError,
    routes::paths,
    session::{Session, SessionStore},
};
use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    http::header,
    web, HttpRequest, HttpResponse,
};
use serde::Deserialize;

/// Cookie binding the OAuth `state` nonce to the browser that started the flow.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Query string Google appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user declined or Google failed.
    pub error: Option<String>,
}

fn cookie(name: &str, value: String, max_age: CookieDuration, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_string(), value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .finish()
}

fn removal(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name.to_string(), "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Signed cookie carrying `session`'s token, living as long as the session.
pub fn session_cookie(config: &SessionConfig, session: &Session) -> Result<Cookie<'static>, AppError> {
    let value = generate_token(&session.token, session.expires_at, &config.secret)?;
    let max_age = CookieDuration::seconds((session.expires_at - session.created_at).num_seconds());
    Ok(cookie(&config.cookie_name, value, max_age, config.secure_cookie))
}

/// 302 to `to`, clearing the session cookie.
pub fn redirect_signed_out(config: &SessionConfig, to: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, to.to_string()))
        .cookie(removal(&config.cookie_name))
        .finish()
}

/// Sends the browser to Google's consent screen.
///
/// A fresh `state` nonce is recorded in `nonces` and set as the
/// `oauth_state` cookie; the callback must present both.
pub fn redirect_to_google(
    oauth: &dyn OAuthProvider,
    nonces: &NonceStore,
    config: &SessionConfig,
) -> Result<HttpResponse, AppError> {
    let nonce = nonces.issue()?;
    let url = oauth.authorization_url(&nonce);
    log::debug!("redirecting to OAuth provider at {}", url.host_str().unwrap_or("?"));

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, url.to_string()))
        .cookie(cookie(
            OAUTH_STATE_COOKIE,
            nonce,
            CookieDuration::minutes(10),
            config.secure_cookie,
        ))
        .finish())
}

/// Completes the Google login.
///
/// ## Responses:
/// - `302 Found` to the dashboard with a new session cookie.
/// - `400 Bad Request` (`OAuthError`) if Google reported an error, the `state`
///   does not match the nonce this browser was given, or the code exchange fails.
///   No session is created in that case.
pub async fn handle_google_callback(
    req: &HttpRequest,
    current: Option<&Session>,
    oauth: &dyn OAuthProvider,
    nonces: &NonceStore,
    users: &dyn UserRepository,
    sessions: &dyn SessionStore,
    config: &SessionConfig,
) -> Result<HttpResponse, AppError> {
    let query = web::Query::<CallbackQuery>::from_query(req.query_string())
        .map_err(|e| AppError::OAuthError(format!("Malformed callback: {}", e)))?
        .into_inner();

    // The nonce is spent whatever happens next.
    let expected = req.cookie(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let issued = match &expected {
        Some(nonce) => nonces.consume(nonce)?,
        None => false,
    };

    if let Some(error) = query.error {
        return Err(AppError::OAuthError(format!("Google sign-in failed: {}", error)));
    }

    let state = query
        .state
        .ok_or_else(|| AppError::OAuthError("Missing state parameter".into()))?;
    if !issued || expected.as_deref() != Some(state.as_str()) {
        log::warn!("rejecting OAuth callback with unknown or mismatched state");
        return Err(AppError::OAuthError("Invalid state parameter".into()));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::OAuthError("Missing code parameter".into()))?;
    let identity = oauth.exchange_code(&code).await?;
    let user = users.find_or_create_oauth_user(&identity).await?;

    // A login always gets a new token.
    if let Some(previous) = current {
        sessions.invalidate(&previous.token).await?;
    }
    let session = Session::start(user.id, user.email_verified, config.lifetime());
    sessions.set(session.clone()).await?;
    log::info!("user {} signed in with Google", user.id);

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, paths::DASHBOARD))
        .cookie(session_cookie(config, &session)?)
        .cookie(removal(OAUTH_STATE_COOKIE))
        .finish())
}

/// Ends the current session and returns to the landing page.
pub async fn logout(
    sessions: &dyn SessionStore,
    session: &Session,
    config: &SessionConfig,
) -> Result<HttpResponse, AppError> {
    sessions.invalidate(&session.token).await?;
    Ok(redirect_signed_out(config, paths::HOME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_token;
    use chrono::Duration;

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "test_secret".into(),
            lifetime_minutes: 120,
            cookie_name: SessionConfig::DEFAULT_COOKIE_NAME.into(),
            secure_cookie: true,
        }
    }

    #[test]
    fn test_session_cookie_round_trips() {
        let config = config();
        let session = Session::start(5, true, Duration::minutes(120));
        let cookie = session_cookie(&config, &session).unwrap();

        assert_eq!(cookie.name(), SessionConfig::DEFAULT_COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::minutes(120)));

        let claims = verify_token(cookie.value(), &config.secret).unwrap();
        assert_eq!(claims.sub, session.token);
    }

    #[test]
    fn test_redirect_signed_out_clears_cookie() {
        let response = redirect_signed_out(&config(), "/");
        assert_eq!(response.status(), 302);
        let cleared = response
            .cookies()
            .find(|c| c.name() == SessionConfig::DEFAULT_COOKIE_NAME)
            .unwrap();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(CookieDuration::ZERO));
    }
}
