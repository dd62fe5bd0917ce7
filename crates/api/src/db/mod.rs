//! Database operations for the Cartwheel `PostgreSQL` store.
//!
//! # Tables
//!
//! - `users` - API users, password hashes and the current access token
//! - `items` - catalog items with stock and audit columns
//! - `items_images` - image paths, cascade-deleted with their item
//! - `carts` - carts with payment status
//! - `cart_items` - cart lines, cascade-deleted with their cart
//!
//! # Layout
//!
//! - [`store`] - storage traits the repositories are written against
//! - [`postgres`] / [`memory`] - the two store implementations
//! - [`rows`] / [`graph`] - flat join rows and their materialization
//! - [`items`], [`carts`], [`users`] - repositories
//! - [`settlement`] - cart payment transaction
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

pub mod carts;
pub mod graph;
pub mod items;
pub mod memory;
pub mod postgres;
pub mod rows;
pub mod settlement;
pub mod store;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use items::ItemRepository;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use settlement::{SettlementError, SettlementTransactor};
pub use store::{CartStore, CatalogStore, SettlementTx, Store, UserStore};
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// A row did not have the shape the query promised.
    #[error("row decode error: {0}")]
    Decode(String),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username, unknown item).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => Self::Decode(err.to_string()),
            other => Self::Database(other),
        }
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_decode_errors_map_to_decode() {
        let err = RepositoryError::from(sqlx::Error::ColumnIndexOutOfBounds { index: 15, len: 12 });
        assert!(matches!(err, RepositoryError::Decode(_)));

        let err = RepositoryError::from(sqlx::Error::ColumnNotFound("image_url".to_owned()));
        assert!(matches!(err, RepositoryError::Decode(msg) if msg.contains("image_url")));
    }

    #[test]
    fn test_other_sqlx_errors_map_to_database() {
        let err = RepositoryError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RepositoryError::Database(_)));

        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
