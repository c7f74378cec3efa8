use crate::{error::AppError, router::RequestContext, routes::paths, views};
use actix_web::HttpResponse;

pub async fn landing(_: RequestContext) -> Result<HttpResponse, AppError> {
    Ok(views::landing(paths::LOGIN))
}

/// Only reachable through the `auth` and `verified` gates.
pub async fn dashboard(_: RequestContext) -> Result<HttpResponse, AppError> {
    Ok(views::dashboard())
}

pub async fn login(_: RequestContext) -> Result<HttpResponse, AppError> {
    Ok(views::login(paths::GOOGLE_REDIRECT))
}

pub async fn verification_notice(_: RequestContext) -> Result<HttpResponse, AppError> {
    Ok(views::verification_notice())
}
