//! Authentication service.
//!
//! Password registration and login, plus opaque bearer tokens. A login
//! replaces the user's previous token; tokens are checked against the expiry
//! stored next to them.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::instrument;

use cartwheel_core::{UserRole, Username};

use crate::db::RepositoryError;
use crate::db::store::{NewUser, UserStore};
use crate::db::users::UserRepository;
use crate::models::{AccessToken, User};
use crate::services::ids::IdGenerator;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Random bytes per access token.
const TOKEN_BYTES: usize = 32;

/// Authentication service.
pub struct AuthService<'a, S: ?Sized> {
    users: UserRepository<'a, S>,
    ids: &'a IdGenerator,
    token_ttl: Duration,
}

impl<'a, S: UserStore + ?Sized> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a S, ids: &'a IdGenerator, token_ttl: Duration) -> Self {
        Self {
            users: UserRepository::new(store),
            ids,
            token_ttl,
        }
    }

    /// Register a new user with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(NewUser {
                id: self.ids.next_id(),
                username,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Log in with username and password, issuing a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let record = self
            .users
            .get_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &record.password_hash)?;

        let token = generate_token();
        let expires_at = Utc::now() + self.token_ttl;
        self.users.set_token(record.id, &token, expires_at).await?;

        Ok(AccessToken {
            access_token: token,
            token_expiration_time: expires_at,
        })
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if no user holds the token.
    /// Returns `AuthError::TokenExpired` if the token is past its expiry.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let record = self
            .users
            .get_by_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        match record.token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => Ok(User::from(record)),
            _ => Err(AuthError::TokenExpired),
        }
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Hashing(format!("stored hash unreadable: {e}")))?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate an opaque URL-safe bearer token.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn ids() -> IdGenerator {
        IdGenerator::new(1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verify_password("correct horse", "not-a-phc-string"),
            Err(AuthError::Hashing(_))
        ));
    }

    #[test]
    fn test_tokens_are_random_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_register_login_authenticate() {
        let store = MemoryStore::new();
        let ids = ids();
        let auth = AuthService::new(&store, &ids, Duration::hours(1));

        let user = auth.register("dave", "password123", UserRole::Admin).await.unwrap();
        let token = auth.login("dave", "password123").await.unwrap();
        assert!(token.token_expiration_time > Utc::now());

        let resolved = auth.authenticate(&token.access_token).await.unwrap();
        assert_eq!(resolved, user);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_and_duplicates() {
        let store = MemoryStore::new();
        let ids = ids();
        let auth = AuthService::new(&store, &ids, Duration::hours(1));

        assert!(matches!(
            auth.register("erin", "short", UserRole::User).await,
            Err(AuthError::WeakPassword(_))
        ));

        auth.register("erin", "long enough", UserRole::User).await.unwrap();
        assert!(matches!(
            auth.register("erin", "long enough", UserRole::User).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let store = MemoryStore::new();
        let ids = ids();
        let auth = AuthService::new(&store, &ids, Duration::hours(1));
        auth.register("frank", "password123", UserRole::User).await.unwrap();

        assert!(matches!(
            auth.login("frank", "password124").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_expired_and_unknown_tokens() {
        let store = MemoryStore::new();
        let ids = ids();
        let auth = AuthService::new(&store, &ids, Duration::zero());
        auth.register("grace", "password123", UserRole::User).await.unwrap();
        let token = auth.login("grace", "password123").await.unwrap();

        assert!(matches!(
            auth.authenticate(&token.access_token).await,
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            auth.authenticate("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
