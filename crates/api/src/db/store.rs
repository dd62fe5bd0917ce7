//! Storage traits.
//!
//! Repositories and the settlement transactor are written against these
//! traits, never against a concrete pool. [`super::PgStore`] is the production
//! implementation; [`super::MemoryStore`] backs tests and local demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use cartwheel_core::{
    CartId, CartLineId, ImageId, ItemId, PaymentStatus, Price, UserId, UserRole, Username,
};

use super::RepositoryError;
use super::rows::{CartGraphRow, ItemGraphRow};

/// A lazy sequence of decoded rows.
///
/// Dropping the stream releases whatever cursor backs it.
pub type RowStream<'a, T> = BoxStream<'a, Result<T, RepositoryError>>;

/// Which carts a cart graph query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartScope {
    All,
    ById(CartId),
    ByUser(UserId),
}

/// Which items an item graph query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemScope {
    All,
    ById(ItemId),
}

/// Input for inserting an item together with its images.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: i32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub images: Vec<NewImage>,
}

/// An image path to attach to a new item.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: ImageId,
    pub url: String,
}

/// Replacement values for an item's mutable columns.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: i32,
    pub modified_by: UserId,
    pub modified_at: DateTime<Utc>,
}

/// Input for inserting a cart together with its lines.
#[derive(Debug, Clone)]
pub struct NewCart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total_price: Option<Price>,
    pub payment_method: String,
    pub lines: Vec<NewCartLine>,
}

/// One line of a new cart.
#[derive(Debug, Clone, Copy)]
pub struct NewCartLine {
    pub id: CartLineId,
    pub item_id: ItemId,
    pub quantity: i32,
}

/// Input for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub username: Username,
    pub password_hash: String,
    pub role: UserRole,
}

/// A stored user, including credentials.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: Username,
    pub password_hash: String,
    pub role: UserRole,
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Catalog storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Rows of `items ⋈ items_images`, ordered by item then image.
    fn item_rows(&self, scope: ItemScope) -> RowStream<'_, ItemGraphRow>;

    /// Insert an item and its images atomically.
    async fn insert_item(&self, item: NewItem) -> Result<(), RepositoryError>;

    /// Overwrite an item's mutable columns. Returns rows affected.
    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<u64, RepositoryError>;

    /// Delete an item and its images. Returns rows affected.
    async fn delete_item(&self, id: ItemId) -> Result<u64, RepositoryError>;
}

/// Cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Rows of `carts ⋈ cart_items ⋈ items ⋈ items_images`, ordered by cart,
    /// line, then image.
    fn cart_rows(&self, scope: CartScope) -> RowStream<'_, CartGraphRow>;

    /// Insert a cart and its lines atomically.
    async fn insert_cart(&self, cart: NewCart) -> Result<(), RepositoryError>;

    /// Delete a cart and its lines. Returns rows affected.
    async fn delete_cart(&self, id: CartId) -> Result<u64, RepositoryError>;

    /// Open a settlement transaction.
    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError>;
}

/// The statements a settlement runs inside one transaction.
///
/// Dropping the handle without calling [`SettlementTx::commit`] discards
/// every change made through it.
#[async_trait]
pub trait SettlementTx: Send {
    /// Set a pending cart to `Paid`. Returns rows affected.
    async fn mark_paid(&mut self, cart: CartId) -> Result<u64, RepositoryError>;

    /// Current payment status of a cart, if it exists.
    async fn cart_status(&mut self, cart: CartId) -> Result<Option<PaymentStatus>, RepositoryError>;

    /// Subtract each line's quantity from its item's stock. Returns rows
    /// affected.
    async fn decrement_stock(&mut self, cart: CartId) -> Result<u64, RepositoryError>;

    /// Number of items whose stock is below zero.
    async fn count_negative_stock(&mut self) -> Result<i64, RepositoryError>;

    /// Make the changes visible.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// Discard the changes.
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// User storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<(), RepositoryError>;

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, RepositoryError>;

    /// Replace the user's access token. Returns rows affected.
    async fn assign_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, RepositoryError>;
}

/// Everything the application needs from storage.
#[async_trait]
pub trait Store: CatalogStore + CartStore + UserStore {
    /// Check that the backing store is reachable.
    async fn health_check(&self) -> Result<(), RepositoryError>;
}
