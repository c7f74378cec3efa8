//! HTML pages. There is no template engine; each view is a small function.

use actix_web::{http::header::ContentType, HttpResponse};

use crate::routes::paths;

fn page(title: &str, body: &str) -> HttpResponse {
    HttpResponse::Ok().content_type(ContentType::html()).body(format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n{body}\n</body>\n\
         </html>\n"
    ))
}

pub fn landing(login_url: &str) -> HttpResponse {
    page(
        "Welcome",
        &format!(
            "<h1>Welcome</h1>\n<p><a href=\"{}\">Log in</a></p>",
            login_url
        ),
    )
}

pub fn dashboard() -> HttpResponse {
    page(
        "Dashboard",
        &format!(
            "<h1>Dashboard</h1>\n<p>You're logged in!</p>\n\
             <form method=\"post\" action=\"{}\"><button>Log out</button></form>",
            paths::LOGOUT
        ),
    )
}

pub fn login(google_url: &str) -> HttpResponse {
    page(
        "Log in",
        &format!(
            "<h1>Log in</h1>\n<p><a href=\"{}\">Sign in with Google</a></p>",
            google_url
        ),
    )
}

pub fn verification_notice() -> HttpResponse {
    page(
        "Verify your email",
        "<h1>Verify your email</h1>\n\
         <p>Your email address has not been verified yet. \
         Sign in with an account whose email is verified to reach the dashboard.</p>",
    )
}
