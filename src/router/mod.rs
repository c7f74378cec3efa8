//! Request routing: a table of (method, pattern) bindings, each guarded by an
//! ordered middleware chain.
//!
//! The table is built once at startup and shared read-only afterwards. Matching
//! is first-match-wins in registration order.

pub mod chain;
pub mod pattern;

use actix_web::{http::Method, web::Bytes, HttpRequest, HttpResponse, ResponseError};
use futures::future::{FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::AppError;
use crate::session::Session;

pub use chain::{Gate, Middleware};
pub use pattern::{PathParams, Pattern};

pub type HandlerFuture = LocalBoxFuture<'static, Result<HttpResponse, AppError>>;
pub type Handler = Arc<dyn Fn(RequestContext) -> HandlerFuture + Send + Sync>;

/// Everything a handler gets to see about the request.
pub struct RequestContext {
    pub request: HttpRequest,
    pub body: Bytes,
    pub params: PathParams,
    pub session: Option<Session>,
}

impl RequestContext {
    /// The session, for handlers behind the `auth` gate.
    pub fn session(&self) -> Result<&Session, AppError> {
        self.session
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

/// Errors raised while building the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    DuplicateRoute { method: Method, pattern: String },
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteError::DuplicateRoute { method, pattern } => {
                write!(f, "route {} {} is already registered", method, pattern)
            }
            RouteError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern {}: {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for RouteError {}

pub struct Route {
    method: Method,
    pattern: Pattern,
    middleware: Vec<Middleware>,
    handler: Handler,
    name: Option<String>,
}

impl Route {
    /// Attaches a name usable with `Router::url_for`.
    pub fn named(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Fails if the same method is already bound to a pattern of
    /// the same shape.
    pub fn register<F, Fut>(
        &mut self,
        method: Method,
        pattern: &str,
        middleware: &[Middleware],
        handler: F,
    ) -> Result<&mut Route, RouteError>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, AppError>> + 'static,
    {
        let pattern = Pattern::parse(pattern)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.shape() == pattern.shape())
        {
            return Err(RouteError::DuplicateRoute {
                method,
                pattern: pattern.as_str().to_string(),
            });
        }

        let boxed: Handler =
            Arc::new(move |ctx: RequestContext| -> HandlerFuture { handler(ctx).boxed_local() });
        self.routes.push(Route {
            method,
            pattern,
            middleware: middleware.to_vec(),
            handler: boxed,
            name: None,
        });
        let last = self.routes.len() - 1;
        Ok(&mut self.routes[last])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Path of the named route with `params` substituted.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        self.routes
            .iter()
            .find(|r| r.name() == Some(name))
            .and_then(|r| r.pattern.render(params))
    }

    /// First route bound to `method` whose pattern matches `path`. `HEAD` falls
    /// back to the `GET` route when no `HEAD` route is registered.
    fn find(&self, method: &Method, path: &str) -> Option<(&Route, PathParams)> {
        let lookup = |method: &Method| {
            self.routes
                .iter()
                .filter(|r| &r.method == method)
                .find_map(|r| r.pattern.matches(path).map(|params| (r, params)))
        };
        lookup(method).or_else(|| {
            if *method == Method::HEAD {
                lookup(&Method::GET)
            } else {
                None
            }
        })
    }

    /// Routes the request, runs the route's gates and then its handler.
    ///
    /// Unmatched requests get a 404; a denying gate's response is returned
    /// as is and the handler is not called.
    pub async fn dispatch(
        &self,
        request: HttpRequest,
        body: Bytes,
        session: Option<Session>,
    ) -> HttpResponse {
        let Some((route, params)) = self.find(request.method(), request.path()) else {
            log::debug!("no route for {} {}", request.method(), request.path());
            return AppError::NotFound(format!(
                "No route for {} {}",
                request.method(),
                request.path()
            ))
            .error_response();
        };

        if let Gate::Deny(response) = chain::run(&route.middleware, &request, session.as_ref()) {
            log::debug!(
                "{} {} denied by middleware with {}",
                request.method(),
                request.path(),
                response.status()
            );
            return response;
        }

        let ctx = RequestContext {
            request,
            body,
            params,
            session,
        };
        match (route.handler)(ctx).await {
            Ok(response) => response,
            Err(err) => {
                log::info!("handler for {} {} failed: {}", route.method, route.pattern, err);
                err.error_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body, test};
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn ok(_: RequestContext) -> Result<HttpResponse, AppError> {
        Ok(HttpResponse::Ok().body("ok"))
    }

    fn deny(_: &HttpRequest, _: Option<&Session>) -> Gate {
        Gate::Deny(HttpResponse::Found().finish())
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[actix_rt::test]
    async fn test_duplicate_routes_are_rejected() {
        let mut router = Router::new();
        router.register(Method::GET, "/profile", &[], ok).unwrap();
        router.register(Method::PATCH, "/profile", &[], ok).unwrap();

        let err = router.register(Method::GET, "profile/", &[], ok).err();
        assert_eq!(
            err,
            Some(RouteError::DuplicateRoute {
                method: Method::GET,
                pattern: "/profile".into()
            })
        );

        router.register(Method::GET, "/users/{id}", &[], ok).unwrap();
        assert!(router.register(Method::GET, "/users/{user}", &[], ok).is_err());
        assert_eq!(router.routes().len(), 3);
    }

    #[actix_rt::test]
    async fn test_unmatched_route_is_not_found() {
        let mut router = Router::new();
        router.register(Method::GET, "/", &[], ok).unwrap();

        let req = test::TestRequest::get().uri("/nowhere").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 404);

        let req = test::TestRequest::delete().uri("/").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 404);
    }

    #[actix_rt::test]
    async fn test_head_is_served_by_get_route() {
        let mut router = Router::new();
        router.register(Method::GET, "/", &[], ok).unwrap();
        router.register(Method::POST, "/logout", &[], ok).unwrap();

        let req = test::TestRequest::default()
            .method(Method::HEAD)
            .uri("/")
            .to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 200);

        let req = test::TestRequest::default()
            .method(Method::HEAD)
            .uri("/logout")
            .to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 404);
    }

    #[actix_rt::test]
    async fn test_first_match_wins_and_params_reach_handler() {
        let mut router = Router::new();
        router
            .register(Method::GET, "/users/me", &[], |_| async {
                Ok::<_, AppError>(HttpResponse::Ok().body("me"))
            })
            .unwrap();
        router
            .register(Method::GET, "/users/{id}", &[], |ctx: RequestContext| async move {
                let id = ctx.param("id").unwrap_or_default().to_string();
                Ok::<_, AppError>(HttpResponse::Ok().body(id))
            })
            .unwrap();

        let req = test::TestRequest::get().uri("/users/me").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(body_text(response).await, "me");

        let req = test::TestRequest::get().uri("/users/42").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(body_text(response).await, "42");
    }

    #[actix_rt::test]
    async fn test_denying_middleware_skips_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let mut router = Router::new();
        router
            .register(Method::GET, "/dashboard", &[deny], move |_| {
                flag.store(true, Ordering::SeqCst);
                async { Ok::<_, AppError>(HttpResponse::Ok().finish()) }
            })
            .unwrap();

        let req = test::TestRequest::get().uri("/dashboard").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 302);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[actix_rt::test]
    async fn test_handler_errors_become_responses() {
        let mut router = Router::new();
        router
            .register(Method::PATCH, "/profile", &[], |_| async {
                Err::<HttpResponse, _>(AppError::validation("name", "required"))
            })
            .unwrap();

        let req = test::TestRequest::patch().uri("/profile").to_http_request();
        let response = router.dispatch(req, Bytes::new(), None).await;
        assert_eq!(response.status(), 422);
    }

    #[actix_rt::test]
    async fn test_url_for() {
        let mut router = Router::new();
        router
            .register(Method::GET, "/profile", &[], ok)
            .unwrap()
            .named("profile.edit");
        router
            .register(Method::GET, "/users/{id}", &[], ok)
            .unwrap()
            .named("users.show");

        assert_eq!(router.url_for("profile.edit", &[]).as_deref(), Some("/profile"));
        assert_eq!(
            router.url_for("users.show", &[("id", "3")]).as_deref(),
            Some("/users/3")
        );
        assert_eq!(router.url_for("users.show", &[]), None);
        assert_eq!(router.url_for("missing", &[]), None);
    }
}
