//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{UserId, UserRole, Username};

/// An API user (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Permission level.
    pub role: UserRole,
}

/// A freshly issued access token.
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    /// Opaque bearer token.
    pub access_token: String,
    /// When the token stops being accepted.
    pub token_expiration_time: DateTime<Utc>,
}
