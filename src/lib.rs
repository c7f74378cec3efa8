#![doc = "The `gatekeeper` library crate."]
#![doc = ""]
#![doc = "Request routing, per-route middleware gates, cookie sessions, Google sign-in"]
#![doc = "and the profile endpoints. The binary (`main.rs`) wires these together with"]
#![doc = "a database, a session store and the HTTP server."]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod router;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;

pub use crate::error::AppError;
pub use crate::router::Router;
pub use crate::state::AppState;
