#![allow(dead_code)]

use actix_web::{
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    test, web, App,
};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;

use gatekeeper::auth::{NonceStore, OAuthProvider, SessionMiddleware};
use gatekeeper::config::SessionConfig;
use gatekeeper::db::InMemoryUserRepository;
use gatekeeper::models::{OAuthIdentity, User};
use gatekeeper::routes::{self, auth::session_cookie};
use gatekeeper::session::{InMemorySessionStore, Session, SessionStore};
use gatekeeper::{AppError, AppState};

pub const GOOD_CODE: &str = "good-code";

/// Accepts `GOOD_CODE` and nothing else.
pub struct FakeProvider {
    pub email_verified: bool,
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> Url {
        let mut url = Url::parse("https://accounts.example.test/o/oauth2/auth").unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "test-client")
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, AppError> {
        if code != GOOD_CODE {
            return Err(AppError::OAuthError("invalid_grant".into()));
        }
        Ok(OAuthIdentity {
            subject: "google-sub-1".into(),
            email: "grace@example.com".into(),
            email_verified: self.email_verified,
            name: Some("Grace Hopper".into()),
            picture: None,
        })
    }
}

pub struct TestContext {
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionStore>,
    pub state: Arc<AppState>,
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        secret: "integration-secret".into(),
        lifetime_minutes: 120,
        cookie_name: SessionConfig::DEFAULT_COOKIE_NAME.into(),
        secure_cookie: false,
    }
}

pub fn context(email_verified: bool) -> TestContext {
    let users = Arc::new(InMemoryUserRepository::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let state = Arc::new(AppState {
        users: users.clone(),
        sessions: sessions.clone(),
        oauth: Arc::new(FakeProvider { email_verified }),
        nonces: Arc::new(NonceStore::default()),
        session_config: session_config(),
    });
    TestContext {
        users,
        sessions,
        state,
    }
}

pub async fn init_app(
    ctx: &TestContext,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    let router = routes::build_router(ctx.state.clone()).unwrap();
    let sessions: Arc<dyn SessionStore> = ctx.sessions.clone();

    test::init_service(
        App::new()
            .app_data(web::Data::new(router))
            .wrap(SessionMiddleware::new(sessions, session_config()))
            .default_service(web::to(routes::dispatch)),
    )
    .await
}

/// Starts a session for `user` and returns the cookie a browser would hold.
pub async fn sign_in(ctx: &TestContext, user: &User) -> Cookie<'static> {
    let config = session_config();
    let session = Session::start(user.id, user.email_verified, config.lifetime());
    ctx.sessions.set(session.clone()).await.unwrap();
    session_cookie(&config, &session).unwrap()
}

/// The value of the cookie named `name` set on `resp`, if any.
pub fn set_cookie(resp: &ServiceResponse, name: &str) -> Option<String> {
    resp.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn location(resp: &ServiceResponse) -> Option<String> {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
