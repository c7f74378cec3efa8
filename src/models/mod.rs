pub mod user;

pub use user::{OAuthIdentity, ProfileUpdate, User};
