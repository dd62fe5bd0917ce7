//! Cart repository.
//!
//! Every read is one `carts ⋈ cart_items ⋈ items ⋈ items_images` query folded
//! into `Cart -> CartLine -> ItemSummary -> Image` graphs by [`CartGraph`].

use tracing::instrument;

use cartwheel_core::{CartId, UserId};

use super::RepositoryError;
use super::graph::{CartGraph, materialize};
use super::store::{CartScope, CartStore, NewCart};
use crate::models::Cart;

/// Repository for carts and their lines.
pub struct CartRepository<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CartStore + ?Sized> CartRepository<'a, S> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn load(&self, scope: CartScope) -> Result<CartGraph, RepositoryError> {
        let graph = materialize(CartGraph::new(), self.store.cart_rows(scope)).await?;
        tracing::debug!(carts = graph.len(), "carts materialized");
        Ok(graph)
    }

    /// List every cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::Decode` if a row does not match the cart graph.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Cart>, RepositoryError> {
        Ok(self.load(CartScope::All).await?.into_carts())
    }

    /// Get one cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no cart has this id.
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::Decode` if a row does not match the cart graph.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn get_by_id(&self, id: CartId) -> Result<Cart, RepositoryError> {
        self.load(CartScope::ById(id))
            .await?
            .into_single()
            .ok_or(RepositoryError::NotFound)
    }

    /// List the carts owned by a user. Unknown users have no carts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::Decode` if a row does not match the cart graph.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Cart>, RepositoryError> {
        Ok(self.load(CartScope::ByUser(user_id)).await?.into_carts())
    }

    /// Insert a cart and its lines, returning the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner or a referenced item
    /// does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn create(&self, cart: NewCart) -> Result<Cart, RepositoryError> {
        let id = cart.id;
        self.store.insert_cart(cart).await?;
        self.get_by_id(id).await
    }

    /// Delete a cart and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no cart has this id.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn delete(&self, id: CartId) -> Result<(), RepositoryError> {
        if self.store.delete_cart(id).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, Utc};

    use cartwheel_core::{
        CartLineId, ImageId, ItemId, PaymentStatus, Price, UserRole, Username,
    };

    use super::*;
    use crate::db::MemoryStore;
    use crate::db::store::{CatalogStore, NewCartLine, NewImage, NewItem, NewUser, UserStore};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, name) in [(1, "alice"), (2, "bob")] {
            store
                .insert_user(NewUser {
                    id: UserId::new(id),
                    username: Username::parse(name).unwrap(),
                    password_hash: "x".to_owned(),
                    role: UserRole::User,
                })
                .await
                .unwrap();
        }
        for (id, images) in [(10, vec![100, 101]), (20, vec![])] {
            store
                .insert_item(NewItem {
                    id: ItemId::new(id),
                    name: format!("item-{id}"),
                    description: String::new(),
                    price: Price::from_minor(300),
                    stock: 5,
                    created_by: UserId::new(1),
                    created_at: Utc::now(),
                    images: images
                        .into_iter()
                        .map(|i| NewImage {
                            id: ImageId::new(i),
                            url: format!("uploads/{i}.png"),
                        })
                        .collect(),
                })
                .await
                .unwrap();
        }
        store
    }

    fn new_cart(id: i64, user: i64, age_secs: i64, lines: &[(i64, i64, i32)]) -> NewCart {
        NewCart {
            id: CartId::new(id),
            user_id: UserId::new(user),
            created_at: Utc::now() - Duration::seconds(age_secs),
            total_price: Some(Price::from_minor(900)),
            payment_method: "card".to_owned(),
            lines: lines
                .iter()
                .map(|&(line, item, quantity)| NewCartLine {
                    id: CartLineId::new(line),
                    item_id: ItemId::new(item),
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_get_cart_with_two_lines() {
        let store = seeded().await;
        let repo = CartRepository::new(&store);
        repo.create(new_cart(1, 1, 0, &[(11, 10, 2), (12, 20, 1)]))
            .await
            .unwrap();

        let cart = repo.get_by_id(CartId::new(1)).await.unwrap();

        assert_eq!(cart.payment_status, PaymentStatus::Pending);
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].quantity, 2);
        let images: Vec<i64> = cart.lines[0]
            .item
            .images
            .iter()
            .map(|i| i.id.as_i64())
            .collect();
        assert_eq!(images, vec![100, 101]);
        assert!(cart.lines[1].item.images.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_creation() {
        let store = seeded().await;
        let repo = CartRepository::new(&store);
        repo.create(new_cart(1, 1, 10, &[])).await.unwrap();
        repo.create(new_cart(2, 2, 30, &[(21, 10, 1)])).await.unwrap();
        repo.create(new_cart(3, 1, 20, &[])).await.unwrap();

        let ids: Vec<i64> = repo
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.as_i64())
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let store = seeded().await;
        let repo = CartRepository::new(&store);
        repo.create(new_cart(1, 1, 0, &[])).await.unwrap();
        repo.create(new_cart(2, 2, 0, &[])).await.unwrap();

        let carts = repo.list_by_user(UserId::new(2)).await.unwrap();
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].user_id, UserId::new(2));

        assert!(repo.list_by_user(UserId::new(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_and_delete() {
        let store = seeded().await;
        let repo = CartRepository::new(&store);

        assert!(matches!(
            repo.get_by_id(CartId::new(1)).await,
            Err(RepositoryError::NotFound)
        ));

        repo.create(new_cart(1, 1, 0, &[(11, 10, 1)])).await.unwrap();
        repo.delete(CartId::new(1)).await.unwrap();
        assert!(matches!(
            repo.get_by_id(CartId::new(1)).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
