pub mod auth;
pub mod health;
pub mod pages;
pub mod profile;

use actix_web::{http::Method, web, HttpRequest, HttpResponse};
use std::sync::Arc;

use crate::auth::{gates, MaybeSession};
use crate::error::AppError;
use crate::router::{RequestContext, RouteError, Router};
use crate::state::AppState;

/// Paths the handlers and gates redirect to.
pub mod paths {
    pub const HOME: &str = "/";
    pub const DASHBOARD: &str = "/dashboard";
    pub const LOGIN: &str = "/login";
    pub const LOGOUT: &str = "/logout";
    pub const VERIFICATION_NOTICE: &str = "/verify-email";
    pub const GOOGLE_REDIRECT: &str = "/auth/google";
    pub const GOOGLE_CALLBACK: &str = "/auth/google/callback";
    pub const PROFILE: &str = "/profile";
    pub const HEALTH: &str = "/health";
}

/// Builds the application's route table around `state`.
pub fn build_router(state: Arc<AppState>) -> Result<Router, RouteError> {
    let mut router = Router::new();

    let s = state.clone();
    router
        .register(Method::GET, paths::GOOGLE_REDIRECT, &[], move |_| {
            let s = s.clone();
            async move { auth::redirect_to_google(s.oauth.as_ref(), &s.nonces, &s.session_config) }
        })?
        .named("auth.google");

    let s = state.clone();
    router
        .register(Method::GET, paths::GOOGLE_CALLBACK, &[], move |ctx: RequestContext| {
            let s = s.clone();
            async move {
                auth::handle_google_callback(
                    &ctx.request,
                    ctx.session.as_ref(),
                    s.oauth.as_ref(),
                    &s.nonces,
                    s.users.as_ref(),
                    s.sessions.as_ref(),
                    &s.session_config,
                )
                .await
            }
        })?
        .named("auth.google.callback");

    router
        .register(Method::GET, paths::HOME, &[], pages::landing)?
        .named("home");

    router
        .register(
            Method::GET,
            paths::DASHBOARD,
            &[gates::auth, gates::verified],
            pages::dashboard,
        )?
        .named("dashboard");

    let s = state.clone();
    router
        .register(Method::GET, paths::PROFILE, &[gates::auth], move |ctx: RequestContext| {
            let s = s.clone();
            async move {
                let user = profile::edit(s.users.as_ref(), ctx.session()?).await?;
                Ok::<_, AppError>(HttpResponse::Ok().json(user))
            }
        })?
        .named("profile.edit");

    let s = state.clone();
    router
        .register(Method::PATCH, paths::PROFILE, &[gates::auth], move |ctx: RequestContext| {
            let s = s.clone();
            async move {
                let user = profile::update(s.users.as_ref(), ctx.session()?, &ctx.body).await?;
                Ok::<_, AppError>(HttpResponse::Ok().json(user))
            }
        })?
        .named("profile.update");

    let s = state.clone();
    router
        .register(Method::DELETE, paths::PROFILE, &[gates::auth], move |ctx: RequestContext| {
            let s = s.clone();
            async move {
                profile::destroy(s.users.as_ref(), s.sessions.as_ref(), ctx.session()?).await?;
                Ok::<_, AppError>(auth::redirect_signed_out(&s.session_config, paths::HOME))
            }
        })?
        .named("profile.destroy");

    router
        .register(Method::GET, paths::LOGIN, &[], pages::login)?
        .named("login");

    let s = state;
    router
        .register(Method::POST, paths::LOGOUT, &[gates::auth], move |ctx: RequestContext| {
            let s = s.clone();
            async move {
                auth::logout(s.sessions.as_ref(), ctx.session()?, &s.session_config).await
            }
        })?
        .named("logout");

    router
        .register(
            Method::GET,
            paths::VERIFICATION_NOTICE,
            &[gates::auth],
            pages::verification_notice,
        )?
        .named("verification.notice");

    router
        .register(Method::GET, paths::HEALTH, &[], health::health)?
        .named("health");

    Ok(router)
}

/// The single actix service in front of the router.
pub async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    router: web::Data<Router>,
    session: MaybeSession,
) -> HttpResponse {
    router.dispatch(req, body, session.0).await
}
