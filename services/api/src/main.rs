use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod booking;
mod config;
mod error;
mod identity;
mod lifecycle;
mod materials;
mod middleware;
mod models;
mod notes;
mod payments;
mod policy;
mod repositories;
mod reviews;
mod routes;
mod sessions;
mod state;
mod stats;
mod users;

#[cfg(test)]
mod testing;

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, init_pool, run_migrations},
    token::TokenVerifier,
};
use tokio::net::TcpListener;

use crate::{
    config::ApiConfig,
    payments::StripeGateway,
    state::{AppState, StateOptions, Stores},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = ApiConfig::from_env()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Without Redis every request goes to the user directory
    let redis_pool = match RedisConfig::from_env().and_then(|c| RedisPool::new(&c)) {
        Ok(redis) => Some(redis),
        Err(e) => {
            warn!("Identity cache disabled: {}", e);
            None
        }
    };

    if config.stripe_secret_key.is_none() {
        warn!("API_STRIPE_SECRET_KEY is not set; paid bookings will fail");
    }
    let payments = Arc::new(StripeGateway::new(
        config.stripe_base_url.clone(),
        config.stripe_secret_key.clone(),
    ));

    let app_state = AppState::new(
        pool.clone(),
        redis_pool,
        Stores::postgres(&pool),
        StateOptions {
            verifier: TokenVerifier::from_env()?,
            identity_cache_ttl: config.identity_cache_ttl,
            payments,
            currency: config.currency.clone(),
        },
    );

    info!("API service initialized successfully");

    let app = routes::create_router(app_state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
