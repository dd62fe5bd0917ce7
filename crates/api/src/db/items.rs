//! Item repository.
//!
//! Reads go through one left-joined query per call and are folded into
//! `Item -> Image` graphs by [`ItemGraph`].

use tracing::instrument;

use cartwheel_core::ItemId;

use super::RepositoryError;
use super::graph::{ItemGraph, materialize};
use super::store::{CatalogStore, ItemScope, ItemUpdate, NewItem};
use crate::models::Item;

/// Repository for catalog items.
pub struct ItemRepository<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> ItemRepository<'a, S> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List every item with its images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::Decode` if a row does not match the item graph.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        let graph = materialize(ItemGraph::new(), self.store.item_rows(ItemScope::All)).await?;
        tracing::debug!(items = graph.len(), "items materialized");
        Ok(graph.into_items())
    }

    /// Get an item with its images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no item has this id.
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::Decode` if a row does not match the item graph.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn get_by_id(&self, id: ItemId) -> Result<Item, RepositoryError> {
        materialize(ItemGraph::new(), self.store.item_rows(ItemScope::ById(id)))
            .await?
            .into_single()
            .ok_or(RepositoryError::NotFound)
    }

    /// Insert an item and its images, returning the stored item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an id is already taken or the
    /// creator does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn create(&self, item: NewItem) -> Result<Item, RepositoryError> {
        let id = item.id;
        self.store.insert_item(item).await?;
        self.get_by_id(id).await
    }

    /// Overwrite an item's mutable fields, returning the stored item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no item has this id.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, update), fields(item_id = %id))]
    pub async fn update(&self, id: ItemId, update: ItemUpdate) -> Result<Item, RepositoryError> {
        if self.store.update_item(id, update).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await
    }

    /// Delete an item and its images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no item has this id.
    /// Returns `RepositoryError::Conflict` if a cart still references the item.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete(&self, id: ItemId) -> Result<(), RepositoryError> {
        if self.store.delete_item(id).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
