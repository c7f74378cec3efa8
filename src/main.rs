use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use dotenv::dotenv;
use env_logger::Env;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;

use gatekeeper::auth::{GoogleProvider, NonceStore, SessionMiddleware};
use gatekeeper::config::Config;
use gatekeeper::db::{InMemoryUserRepository, PgUserRepository, UserRepository};
use gatekeeper::routes;
use gatekeeper::session::{InMemorySessionStore, SessionStore};
use gatekeeper::state::AppState;

const PURGE_INTERVAL_SECS: u64 = 300;

fn io_error<E: std::fmt::Display>(context: &str, e: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

async fn user_repository(config: &Config) -> io::Result<Arc<dyn UserRepository>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .map_err(|e| io_error("Failed to connect to database", e))?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| io_error("Failed to run migrations", e))?;
            log::info!("Using PostgreSQL user repository");
            Ok(Arc::new(PgUserRepository::new(pool)))
        }
        None => {
            log::warn!("DATABASE_URL is not set; users are kept in memory");
            Ok(Arc::new(InMemoryUserRepository::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| io_error("Invalid configuration", e))?;

    let users = user_repository(&config).await?;
    let sessions = Arc::new(InMemorySessionStore::new());
    let nonces = Arc::new(NonceStore::default());

    let state = Arc::new(AppState {
        users,
        sessions: sessions.clone(),
        oauth: Arc::new(GoogleProvider::new(config.google.clone())),
        nonces: nonces.clone(),
        session_config: config.session.clone(),
    });

    let router = routes::build_router(state).map_err(|e| io_error("Invalid route table", e))?;
    for route in router.routes() {
        log::debug!(
            "{} {} ({})",
            route.method(),
            route.pattern(),
            route.name().unwrap_or("unnamed")
        );
    }
    let router = web::Data::new(router);
    let session_store: Arc<dyn SessionStore> = sessions.clone();

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(PURGE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let expired = sessions.purge_expired(now).await;
            let stale = nonces.purge_expired(now).unwrap_or_else(|e| {
                log::error!("Failed to purge OAuth nonces: {}", e);
                0
            });
            if expired + stale > 0 {
                log::debug!("Purged {} expired sessions and {} stale nonces", expired, stale);
            }
        }
    });

    let session_config = config.session.clone();
    let allowed_origin = config.app_url.clone();

    log::info!("Starting gatekeeper server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&allowed_origin)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(router.clone())
            .wrap(SessionMiddleware::new(
                session_store.clone(),
                session_config.clone(),
            ))
            .wrap(Logger::default())
            .wrap(cors)
            .default_service(web::to(routes::dispatch))
    })
    .bind((config.server_host.clone(), config.server_port))?
    .run()
    .await
}
