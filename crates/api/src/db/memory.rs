//! In-process store.
//!
//! Holds every table behind one `tokio::sync::Mutex` and produces the same
//! left-joined rows, in the same order, as the `PostgreSQL` queries. Used by
//! tests and for running the API without a database.
//!
//! Row streams are not lazy: each query builds its full result under the
//! table lock and then yields it row by row. Fine for test-sized data.
//!
//! A settlement holds the table lock for its whole lifetime and works on a
//! copy of the tables; commit writes the copy back, anything else drops it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tokio::sync::{Mutex, OwnedMutexGuard};

use cartwheel_core::{CartId, CartLineId, ImageId, ItemId, PaymentStatus, UserId, Username};

use super::RepositoryError;
use super::rows::{CartGraphRow, ItemGraphRow};
use super::store::{
    CartScope, CartStore, CatalogStore, ItemScope, ItemUpdate, NewCart, NewItem, NewUser,
    RowStream, SettlementTx, Store, UserRecord, UserStore,
};

#[derive(Debug, Clone)]
struct ItemRecord {
    name: String,
    description: String,
    price: i64,
    stock: i32,
    created_at: DateTime<Utc>,
    created_by: UserId,
    modified_at: DateTime<Utc>,
    modified_by: UserId,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    item_id: ItemId,
    url: String,
}

#[derive(Debug, Clone)]
struct CartRecord {
    user_id: UserId,
    created_at: DateTime<Utc>,
    total_price: Option<i64>,
    payment_method: String,
    payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Copy)]
struct LineRecord {
    cart_id: CartId,
    item_id: ItemId,
    quantity: i32,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    items: BTreeMap<ItemId, ItemRecord>,
    images: BTreeMap<ImageId, ImageRecord>,
    carts: BTreeMap<CartId, CartRecord>,
    lines: BTreeMap<CartLineId, LineRecord>,
}

impl Tables {
    fn images_of(&self, item: ItemId) -> impl Iterator<Item = (ImageId, &ImageRecord)> {
        self.images
            .iter()
            .filter(move |(_, image)| image.item_id == item)
            .map(|(&id, image)| (id, image))
    }

    fn lines_of(&self, cart: CartId) -> impl Iterator<Item = (CartLineId, LineRecord)> + '_ {
        self.lines
            .iter()
            .filter(move |(_, line)| line.cart_id == cart)
            .map(|(&id, &line)| (id, line))
    }

    fn item_rows(&self, scope: ItemScope) -> Vec<ItemGraphRow> {
        let mut items: Vec<(&ItemId, &ItemRecord)> = match scope {
            ItemScope::All => self.items.iter().collect(),
            ItemScope::ById(id) => self.items.get_key_value(&id).into_iter().collect(),
        };
        items.sort_by_key(|(id, item)| (item.created_at, **id));

        let mut rows = Vec::new();
        for (&id, item) in items {
            let base = ItemGraphRow {
                item_id: id,
                item_name: item.name.clone(),
                item_description: item.description.clone(),
                item_price: item.price,
                item_stock: item.stock,
                item_created_at: item.created_at,
                item_created_by: item.created_by,
                item_modified_at: item.modified_at,
                item_modified_by: item.modified_by,
                image_id: None,
                image_item_id: None,
                image_url: None,
            };

            let before = rows.len();
            for (image_id, image) in self.images_of(id) {
                rows.push(ItemGraphRow {
                    image_id: Some(image_id),
                    image_item_id: Some(image.item_id),
                    image_url: Some(image.url.clone()),
                    ..base.clone()
                });
            }
            if rows.len() == before {
                rows.push(base);
            }
        }
        rows
    }

    fn cart_rows(&self, scope: CartScope) -> Vec<CartGraphRow> {
        let mut carts: Vec<(&CartId, &CartRecord)> = match scope {
            CartScope::All => self.carts.iter().collect(),
            CartScope::ById(id) => self.carts.get_key_value(&id).into_iter().collect(),
            CartScope::ByUser(user) => self
                .carts
                .iter()
                .filter(|(_, cart)| cart.user_id == user)
                .collect(),
        };
        carts.sort_by_key(|(id, cart)| (cart.created_at, **id));

        let mut rows = Vec::new();
        for (&cart_id, cart) in carts {
            let base = CartGraphRow {
                cart_id,
                cart_user_id: cart.user_id,
                cart_created_at: cart.created_at,
                cart_total_price: cart.total_price,
                cart_payment_method: cart.payment_method.clone(),
                cart_payment_status: cart.payment_status.as_str().to_owned(),
                line_id: None,
                line_cart_id: None,
                line_item_id: None,
                line_quantity: None,
                item_id: None,
                item_name: None,
                item_price: None,
                image_id: None,
                image_item_id: None,
                image_url: None,
            };

            let mut lines = self.lines_of(cart_id).peekable();
            if lines.peek().is_none() {
                rows.push(base);
                continue;
            }

            for (line_id, line) in lines {
                let item = self.items.get(&line.item_id);
                let with_line = CartGraphRow {
                    line_id: Some(line_id),
                    line_cart_id: Some(line.cart_id),
                    line_item_id: Some(line.item_id),
                    line_quantity: Some(line.quantity),
                    item_id: item.map(|_| line.item_id),
                    item_name: item.map(|i| i.name.clone()),
                    item_price: item.map(|i| i.price),
                    ..base.clone()
                };

                let before = rows.len();
                if item.is_some() {
                    for (image_id, image) in self.images_of(line.item_id) {
                        rows.push(CartGraphRow {
                            image_id: Some(image_id),
                            image_item_id: Some(image.item_id),
                            image_url: Some(image.url.clone()),
                            ..with_line.clone()
                        });
                    }
                }
                if rows.len() == before {
                    rows.push(with_line);
                }
            }
        }
        rows
    }

    fn mark_paid(&mut self, cart: CartId) -> u64 {
        match self.carts.get_mut(&cart) {
            Some(record) if record.payment_status == PaymentStatus::Pending => {
                record.payment_status = PaymentStatus::Paid;
                1
            }
            _ => 0,
        }
    }

    /// Quantities of one cart, summed per item.
    /// Summed line quantities per item, widened so no cart can overflow.
    fn demand(&self, cart: CartId) -> HashMap<ItemId, i64> {
        let mut demand: HashMap<ItemId, i64> = HashMap::new();
        for (_, line) in self.lines_of(cart) {
            let total = demand.entry(line.item_id).or_insert(0);
            *total = total.saturating_add(i64::from(line.quantity));
        }
        demand
    }

    /// Same arithmetic as `DECREMENT_STOCK`: a shortfall past `-1` is clamped
    /// to `-1` so it still fits the column and still counts as negative.
    fn decrement_stock(&mut self, cart: CartId) -> u64 {
        let mut updated = 0;
        for (item_id, quantity) in self.demand(cart) {
            if let Some(item) = self.items.get_mut(&item_id) {
                let remaining = i64::from(item.stock).saturating_sub(quantity).max(-1);
                item.stock = i32::try_from(remaining).unwrap_or(-1);
                updated += 1;
            }
        }
        updated
    }

    fn count_negative_stock(&self) -> i64 {
        let negative = self.items.values().filter(|item| item.stock < 0).count();
        i64::try_from(negative).unwrap_or(i64::MAX)
    }
}

/// Store backed by in-process tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock of an item.
    pub async fn item_stock(&self, id: ItemId) -> Option<i32> {
        self.tables.lock().await.items.get(&id).map(|item| item.stock)
    }

    /// Current payment status of a cart.
    pub async fn payment_status(&self, id: CartId) -> Option<PaymentStatus> {
        self.tables
            .lock()
            .await
            .carts
            .get(&id)
            .map(|cart| cart.payment_status)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    fn item_rows(&self, scope: ItemScope) -> RowStream<'_, ItemGraphRow> {
        let tables = Arc::clone(&self.tables);
        stream::once(async move { tables.lock().await.item_rows(scope) })
            .flat_map(|rows| stream::iter(rows.into_iter().map(Ok)))
            .boxed()
    }

    async fn insert_item(&self, item: NewItem) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.items.contains_key(&item.id) {
            return Err(RepositoryError::Conflict(format!("item {} already exists", item.id)));
        }
        if let Some(image) = item.images.iter().find(|i| tables.images.contains_key(&i.id)) {
            return Err(RepositoryError::Conflict(format!("image {} already exists", image.id)));
        }

        for image in item.images {
            tables.images.insert(
                image.id,
                ImageRecord {
                    item_id: item.id,
                    url: image.url,
                },
            );
        }
        tables.items.insert(
            item.id,
            ItemRecord {
                name: item.name,
                description: item.description,
                price: item.price.minor_units(),
                stock: item.stock,
                created_at: item.created_at,
                created_by: item.created_by,
                modified_at: item.created_at,
                modified_by: item.created_by,
            },
        );
        Ok(())
    }

    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(item) = tables.items.get_mut(&id) else {
            return Ok(0);
        };

        item.name = update.name;
        item.description = update.description;
        item.price = update.price.minor_units();
        item.stock = update.stock;
        item.modified_at = update.modified_at;
        item.modified_by = update.modified_by;
        Ok(1)
    }

    async fn delete_item(&self, id: ItemId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.lines.values().any(|line| line.item_id == id) {
            return Err(RepositoryError::Conflict(format!(
                "item {id} is referenced by a cart"
            )));
        }
        if tables.items.remove(&id).is_none() {
            return Ok(0);
        }
        tables.images.retain(|_, image| image.item_id != id);
        Ok(1)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    fn cart_rows(&self, scope: CartScope) -> RowStream<'_, CartGraphRow> {
        let tables = Arc::clone(&self.tables);
        stream::once(async move { tables.lock().await.cart_rows(scope) })
            .flat_map(|rows| stream::iter(rows.into_iter().map(Ok)))
            .boxed()
    }

    async fn insert_cart(&self, cart: NewCart) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.carts.contains_key(&cart.id) {
            return Err(RepositoryError::Conflict(format!("cart {} already exists", cart.id)));
        }
        if !tables.users.contains_key(&cart.user_id) {
            return Err(RepositoryError::Conflict(format!("unknown user {}", cart.user_id)));
        }
        for line in &cart.lines {
            if !tables.items.contains_key(&line.item_id) {
                return Err(RepositoryError::Conflict(format!("unknown item {}", line.item_id)));
            }
            if tables.lines.contains_key(&line.id) {
                return Err(RepositoryError::Conflict(format!(
                    "cart line {} already exists",
                    line.id
                )));
            }
        }

        for line in cart.lines {
            tables.lines.insert(
                line.id,
                LineRecord {
                    cart_id: cart.id,
                    item_id: line.item_id,
                    quantity: line.quantity,
                },
            );
        }
        tables.carts.insert(
            cart.id,
            CartRecord {
                user_id: cart.user_id,
                created_at: cart.created_at,
                total_price: cart.total_price.map(|p| p.minor_units()),
                payment_method: cart.payment_method,
                payment_status: PaymentStatus::Pending,
            },
        );
        Ok(())
    }

    async fn delete_cart(&self, id: CartId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.carts.remove(&id).is_none() {
            return Ok(0);
        }
        tables.lines.retain(|_, line| line.cart_id != id);
        Ok(1)
    }

    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySettlementTx { guard, working }))
    }
}

/// Settlement transaction over [`MemoryStore`].
struct MemorySettlementTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl SettlementTx for MemorySettlementTx {
    async fn mark_paid(&mut self, cart: CartId) -> Result<u64, RepositoryError> {
        Ok(self.working.mark_paid(cart))
    }

    async fn cart_status(&mut self, cart: CartId) -> Result<Option<PaymentStatus>, RepositoryError> {
        Ok(self.working.carts.get(&cart).map(|c| c.payment_status))
    }

    async fn decrement_stock(&mut self, cart: CartId) -> Result<u64, RepositoryError> {
        Ok(self.working.decrement_stock(cart))
    }

    async fn count_negative_stock(&mut self) -> Result<i64, RepositoryError> {
        Ok(self.working.count_negative_stock())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.users.contains_key(&user.id)
            || tables.users.values().any(|u| u.username == user.username)
        {
            return Err(RepositoryError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }

        tables.users.insert(
            user.id,
            UserRecord {
                id: user.id,
                username: user.username,
                password_hash: user.password_hash,
                role: user.role,
                access_token: None,
                token_expires_at: None,
            },
        );
        Ok(())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| &u.username == username).cloned())
    }

    async fn assign_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(0);
        };
        user.access_token = Some(token.to_owned());
        user.token_expires_at = Some(expires_at);
        Ok(1)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.access_token.as_deref() == Some(token))
            .cloned())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
