use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::session::Session;

/// The session `SessionMiddleware` attached to the request, if any.
///
/// Extraction never fails: requests without a session are anonymous and it is
/// up to the route's gates to turn them away.
#[derive(Debug, Clone, Default)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequest for MaybeSession {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeSession(req.extensions().get::<Session>().cloned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use chrono::Duration;

    #[actix_rt::test]
    async fn test_session_is_extracted_from_extensions() {
        let req = test::TestRequest::default().to_http_request();
        let session = Session::start(123, true, Duration::minutes(5));
        req.extensions_mut().insert(session.clone());

        let mut payload = Payload::None;
        let extracted = MaybeSession::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(extracted.0, Some(session));
    }

    #[actix_rt::test]
    async fn test_missing_session_is_anonymous() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let extracted = MaybeSession::from_request(&req, &mut payload).await.unwrap();
        assert!(extracted.0.is_none());
    }
}
