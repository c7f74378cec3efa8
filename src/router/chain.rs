use actix_web::{HttpRequest, HttpResponse};

use crate::session::Session;

/// Outcome of a single gate.
#[derive(Debug)]
pub enum Gate {
    Allow,
    /// Stop here and answer with this response.
    Deny(HttpResponse),
}

/// A request gate: a pure function of the request and its session.
pub type Middleware = fn(&HttpRequest, Option<&Session>) -> Gate;

/// Runs `chain` left to right. The first `Deny` wins and later gates never run.
pub fn run(chain: &[Middleware], req: &HttpRequest, session: Option<&Session>) -> Gate {
    for gate in chain {
        if let Gate::Deny(response) = gate(req, session) {
            return Gate::Deny(response);
        }
    }
    Gate::Allow
}
