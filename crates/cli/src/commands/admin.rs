//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an admin
//! cartwheel admin create -u alice -p 'correct horse' -r admin
//!
//! # Create a regular user
//! cartwheel admin create -u bob -p 'battery staple' -r user
//! ```
//!
//! The HTTP API refuses self-registration as `admin`, so this is where admin
//! accounts come from.

use cartwheel_api::services::auth::{AuthError, AuthService};
use cartwheel_api::services::ids::{IdError, IdGenerator};
use cartwheel_core::{UserId, UserRole};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, user")]
    InvalidRole(String),

    /// Id generator could not be built from the configured node.
    #[error(transparent)]
    Ids(#[from] IdError),

    /// Registration was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a new user.
///
/// # Arguments
///
/// * `username` - Login name
/// * `password` - Plain-text password, hashed before storage
/// * `role` - `admin` or `user`
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError::InvalidRole` for an unknown role, and
/// `AdminError::Auth` if the username is taken or the password is too weak.
pub async fn create_user(username: &str, password: &str, role: &str) -> Result<UserId, AdminError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    let (config, store) = connect().await?;
    let ids = IdGenerator::new(config.node_id)?;

    tracing::info!("Creating user: {} ({})", username, role);

    let user = AuthService::new(&store, &ids, config.token_ttl)
        .register(username, password, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Role: {}",
        user.id,
        user.username,
        user.role
    );

    Ok(user.id)
}
