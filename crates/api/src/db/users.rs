//! User repository for database operations.
//!
//! Passwords arrive here already hashed; hashing and token generation live in
//! `services::auth`.

use chrono::{DateTime, Utc};
use tracing::instrument;

use cartwheel_core::{UserId, Username};

use super::RepositoryError;
use super::store::{NewUser, UserRecord, UserStore};
use crate::models::User;

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            role: record.role,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: UserStore + ?Sized> UserRepository<'a, S> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let created = User {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        };
        self.store.insert_user(user).await?;
        Ok(created)
    }

    /// Get a user and their credentials by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored column is invalid.
    pub async fn get_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        self.store.find_by_username(username).await
    }

    /// Get the user holding an access token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored column is invalid.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<UserRecord>, RepositoryError> {
        self.store.find_by_token(token).await
    }

    /// Replace a user's access token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, token), fields(user_id = %id))]
    pub async fn set_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if self.store.assign_token(id, token, expires_at).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::UserRole;

    use super::*;
    use crate::db::MemoryStore;

    fn new_user(id: i64, name: &str) -> NewUser {
        NewUser {
            id: UserId::new(id),
            username: Username::parse(name).unwrap(),
            password_hash: "$argon2id$stub".to_owned(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);

        let user = repo.create(new_user(1, "carol")).await.unwrap();
        assert_eq!(user.username.as_str(), "carol");

        let record = repo
            .get_by_username(&Username::parse("carol").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, UserId::new(1));
        assert!(record.access_token.is_none());
    }

    #[tokio::test]
    async fn test_token_replaces_previous() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);
        repo.create(new_user(1, "carol")).await.unwrap();
        let expires = Utc::now();

        repo.set_token(UserId::new(1), "first", expires).await.unwrap();
        repo.set_token(UserId::new(1), "second", expires).await.unwrap();

        assert!(repo.get_by_token("first").await.unwrap().is_none());
        let record = repo.get_by_token("second").await.unwrap().unwrap();
        assert_eq!(record.token_expires_at, Some(expires));
    }

    #[tokio::test]
    async fn test_token_for_unknown_user() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);

        let err = repo
            .set_token(UserId::new(5), "t", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
