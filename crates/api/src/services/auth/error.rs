//! Authentication errors.
//!
//! Login and token failures deliberately collapse to a few variants: a caller
//! learns that a credential was rejected, never which check rejected it.

use thiserror::Error;

use cartwheel_core::UsernameError;

use crate::db::RepositoryError;

/// Why a registration, login or token check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("password too weak: {0}")]
    WeakPassword(String),

    #[error("username already taken")]
    UserAlreadyExists,

    /// Unknown user or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No user holds the presented token.
    #[error("invalid access token")]
    InvalidToken,

    #[error("access token expired")]
    TokenExpired,

    /// Argon2 failed to hash, or a stored hash is unreadable.
    #[error("password hash: {0}")]
    Hashing(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
