use crate::{error::AppError, router::RequestContext};
use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

/// Health check endpoint
///
/// Returns the current status of the service and timestamp.
pub async fn health(_: RequestContext) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now()
    })))
}
