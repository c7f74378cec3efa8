use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use chrono::Utc;
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::token::verify_token;
use crate::config::SessionConfig;
use crate::error::AppError;
use crate::session::{Session, SessionStore};

/// Resolves the session cookie into a `Session` stored in the request extensions.
///
/// This never rejects a request on its own: a missing, tampered, expired or
/// revoked cookie simply leaves the request anonymous. The route's gates decide
/// what an anonymous request may do.
pub struct SessionMiddleware {
    sessions: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionMiddleware {
    pub fn new(sessions: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { sessions, config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    sessions: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let sessions = Arc::clone(&self.sessions);
        let cookie = req
            .cookie(&self.config.cookie_name)
            .map(|c| c.value().to_string());
        let secret = self.config.secret.clone();

        Box::pin(async move {
            if let Some(cookie) = cookie {
                // Store failures are server errors, not anonymous requests.
                if let Some(session) = resolve(&cookie, &secret, sessions.as_ref()).await? {
                    req.extensions_mut().insert(session);
                }
            }
            service.call(req).await
        })
    }
}

async fn resolve(
    cookie: &str,
    secret: &str,
    sessions: &dyn SessionStore,
) -> Result<Option<Session>, AppError> {
    let claims = match verify_token(cookie, secret) {
        Ok(claims) => claims,
        Err(err) => {
            log::debug!("ignoring session cookie: {}", err);
            return Ok(None);
        }
    };

    let session = sessions.get(&claims.sub).await?;
    Ok(session.filter(|s| !s.is_expired(Utc::now())))
}
