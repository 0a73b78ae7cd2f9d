use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod middleware;
mod models;
mod oauth;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod validation;

#[cfg(test)]
mod testing;

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, init_pool, run_migrations},
};
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::{
    config::AuthConfig,
    jwt::{JwtConfig, JwtService},
    oauth::{OAuthClient, OAuthConfig},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub sessions: SessionManager,
    pub user_repository: UserRepository,
    pub rate_limiter: RateLimiter,
    /// Google sign-in, when configured
    pub oauth: Option<OAuthClient>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config)?;

    let oauth = match OAuthConfig::google_from_env() {
        Some(google) => Some(OAuthClient::new_google(google)?),
        None => {
            warn!("GOOGLE_CLIENT_ID is not set; Google sign-in is disabled");
            None
        }
    };

    let app_state = AppState {
        sessions: SessionManager::new(redis_pool.clone(), jwt_service.refresh_token_expiry()),
        user_repository: UserRepository::new(pool.clone()),
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        db_pool: pool,
        redis_pool,
        jwt_service,
        oauth,
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
