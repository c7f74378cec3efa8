use std::env;
use std::fmt;

/// Settings for the session cookie and its backing store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HS256 key used to sign the session cookie.
    pub secret: String,
    /// Lifetime of a session in minutes.
    pub lifetime_minutes: i64,
    pub cookie_name: String,
    pub secure_cookie: bool,
}

impl SessionConfig {
    pub const DEFAULT_COOKIE_NAME: &'static str = "gatekeeper_session";

    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lifetime_minutes)
    }
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

pub struct Config {
    /// `None` selects the in-memory user repository.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub app_url: String,
    pub session: SessionConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = parse_or(&lookup, "SERVER_PORT", 8080u16)?;
        let app_url = lookup("APP_URL")
            .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port))
            .trim_end_matches('/')
            .to_string();

        let lifetime_minutes = parse_or(&lookup, "SESSION_LIFETIME", 120i64)?;
        if lifetime_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_LIFETIME",
                value: lifetime_minutes.to_string(),
            });
        }

        let session = SessionConfig {
            secret: required("SESSION_SECRET")?,
            lifetime_minutes,
            cookie_name: SessionConfig::DEFAULT_COOKIE_NAME.to_string(),
            secure_cookie: parse_or(&lookup, "SESSION_SECURE_COOKIE", false)?,
        };

        let google = GoogleConfig {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: lookup("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| format!("{}/auth/google/callback", app_url)),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            server_port,
            server_host,
            app_url,
            session,
            google,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
