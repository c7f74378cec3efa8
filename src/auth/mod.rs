pub mod extractors;
pub mod gates;
pub mod middleware;
pub mod oauth;
pub mod token;

// Re-export necessary items
pub use extractors::MaybeSession;
pub use middleware::SessionMiddleware;
pub use oauth::{GoogleProvider, NonceStore, OAuthProvider};
pub use token::{generate_token, verify_token, Claims};
