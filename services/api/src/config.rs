//! Service settings
//!
//! Defaults layered under `API_`-prefixed environment variables. Database,
//! Redis and JWT keys are read by their own `from_env` constructors in
//! `common`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Seconds a resolved identity stays in Redis
    pub identity_cache_ttl: u64,
    #[serde(default)]
    pub stripe_secret_key: Option<String>,
    pub stripe_base_url: String,
    pub currency: String,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("identity_cache_ttl", 300)?
            .set_default("stripe_base_url", "https://api.stripe.com")?
            .set_default("currency", "usd")?
            .add_source(Environment::with_prefix("API").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
