//! The `auth` and `verified` gates attached to routes.
//!
//! Browsers are redirected; clients asking for JSON get a 401/403 body instead.

use actix_web::{
    http::header::{self, HeaderValue},
    HttpRequest, HttpResponse, ResponseError,
};
use chrono::Utc;

use crate::error::AppError;
use crate::router::Gate;
use crate::routes::paths;
use crate::session::{Session, SessionState};

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

fn redirect(to: &'static str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, HeaderValue::from_static(to)))
        .finish()
}

fn state_of(session: Option<&Session>) -> SessionState {
    session
        .map(|s| s.state(Utc::now()))
        .unwrap_or(SessionState::Anonymous)
}

fn deny_anonymous(req: &HttpRequest) -> Gate {
    if wants_json(req) {
        Gate::Deny(AppError::Unauthorized("Not authenticated".into()).error_response())
    } else {
        Gate::Deny(redirect(paths::LOGIN))
    }
}

/// Requires a live session that belongs to a user.
pub fn auth(req: &HttpRequest, session: Option<&Session>) -> Gate {
    match state_of(session) {
        SessionState::Anonymous => deny_anonymous(req),
        SessionState::Authenticated | SessionState::Verified => Gate::Allow,
    }
}

/// Requires what `auth` requires, plus a verified session.
pub fn verified(req: &HttpRequest, session: Option<&Session>) -> Gate {
    match state_of(session) {
        SessionState::Anonymous => deny_anonymous(req),
        SessionState::Authenticated if wants_json(req) => Gate::Deny(
            AppError::Forbidden("Your email address is not verified.".into()).error_response(),
        ),
        SessionState::Authenticated => Gate::Deny(redirect(paths::VERIFICATION_NOTICE)),
        SessionState::Verified => Gate::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use chrono::Duration;

    fn location(gate: Gate) -> Option<String> {
        match gate {
            Gate::Deny(response) => response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            Gate::Allow => None,
        }
    }

    #[actix_rt::test]
    async fn test_auth_gate() {
        let req = test::TestRequest::default().to_http_request();
        let session = Session::start(1, false, Duration::minutes(5));

        assert!(matches!(auth(&req, Some(&session)), Gate::Allow));
        assert_eq!(location(auth(&req, None)).as_deref(), Some(paths::LOGIN));

        let mut expired = session.clone();
        expired.expires_at = Utc::now() - Duration::seconds(1);
        assert_eq!(location(auth(&req, Some(&expired))).as_deref(), Some(paths::LOGIN));

        let mut anonymous = session;
        anonymous.user_id = None;
        assert_eq!(location(auth(&req, Some(&anonymous))).as_deref(), Some(paths::LOGIN));
    }

    #[actix_rt::test]
    async fn test_verified_gate() {
        let req = test::TestRequest::default().to_http_request();
        let unverified = Session::start(1, false, Duration::minutes(5));
        let verified_session = Session::start(1, true, Duration::minutes(5));

        assert!(matches!(verified(&req, Some(&verified_session)), Gate::Allow));
        assert_eq!(
            location(verified(&req, Some(&unverified))).as_deref(),
            Some(paths::VERIFICATION_NOTICE)
        );
        assert_eq!(location(verified(&req, None)).as_deref(), Some(paths::LOGIN));
    }

    #[actix_rt::test]
    async fn test_json_clients_get_status_codes() {
        let req = test::TestRequest::default()
            .insert_header((header::ACCEPT, "application/json"))
            .to_http_request();
        let unverified = Session::start(1, false, Duration::minutes(5));

        match auth(&req, None) {
            Gate::Deny(response) => assert_eq!(response.status(), 401),
            Gate::Allow => panic!("anonymous request allowed"),
        }
        match verified(&req, Some(&unverified)) {
            Gate::Deny(response) => assert_eq!(response.status(), 403),
            Gate::Allow => panic!("unverified request allowed"),
        }
    }
}
