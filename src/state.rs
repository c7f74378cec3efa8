use std::sync::Arc;

use crate::auth::{NonceStore, OAuthProvider};
use crate::config::SessionConfig;
use crate::db::UserRepository;
use crate::session::SessionStore;

/// The collaborators handed to the route table at construction.
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub nonces: Arc<NonceStore>,
    pub session_config: SessionConfig,
}
