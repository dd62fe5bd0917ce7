//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use cartwheel_api::config::{ApiConfig, ConfigError};
use cartwheel_api::db::{self, PgStore};

/// Load configuration and open a store against the configured database.
async fn connect() -> Result<(ApiConfig, PgStore), ConnectError> {
    let config = ApiConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    Ok((config, PgStore::new(pool)))
}

/// Failure to reach the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
