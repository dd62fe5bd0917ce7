//! Flat-row-to-graph materialization.
//!
//! The cart and item read paths each run a single left-joined query and get
//! back one row per (parent, child, image) combination. The builders in this
//! module fold those rows into a deduplicated tree:
//!
//! ```text
//! Cart ─┬─ CartLine ── ItemSummary ─┬─ Image
//!       │                           └─ Image
//!       └─ CartLine ── ItemSummary
//!
//! Item ─┬─ Image
//!       └─ Image
//! ```
//!
//! Parents live in a dense arena (`Vec`) and are located through id indexes:
//! `parent id -> slot` and, for carts, `line id -> (cart slot, line slot)`.
//! Reusing an entity is an index lookup followed by an in-place mutation of
//! its arena slot, so later rows extend an entity rather than copy it.
//!
//! Output order is the order in which parent ids were first seen. Images are
//! appended without dedup; the join shape yields each image once per line.

use std::collections::HashMap;

use futures::TryStreamExt;
use thiserror::Error;

use cartwheel_core::{CartId, CartLineId, ImageId, ItemId, PaymentStatus, Price};

use super::RepositoryError;
use super::rows::{CartGraphRow, ItemGraphRow};
use super::store::RowStream;
use crate::models::{Cart, CartLine, Image, Item, ItemSummary};

/// A row that cannot be folded into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDecodeError {
    /// A child id is present but one of its required sibling columns is null.
    #[error("{entity} {id} is missing column `{column}`")]
    MissingColumn {
        entity: &'static str,
        id: i64,
        column: &'static str,
    },

    /// `carts.payment_status` holds an unknown value.
    #[error("cart {cart} has {reason}")]
    InvalidPaymentStatus { cart: CartId, reason: String },
}

impl From<RowDecodeError> for RepositoryError {
    fn from(err: RowDecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A builder that folds flat rows into a graph.
pub trait GraphBuilder {
    /// The flat row type consumed.
    type Row;

    /// Fold one row into the graph.
    ///
    /// # Errors
    ///
    /// Returns `RowDecodeError` if the row cannot be decoded.
    fn push(&mut self, row: Self::Row) -> Result<(), RowDecodeError>;
}

/// Drain a row stream into `builder`.
///
/// The stream is consumed to completion or until the first error; either way
/// it is dropped before returning, which releases the underlying cursor.
/// On error the partially built graph is discarded with the builder.
///
/// # Errors
///
/// Returns the first error yielded by the stream, or `RepositoryError::Decode`
/// if a row cannot be folded into the graph.
pub async fn materialize<B: GraphBuilder>(
    mut builder: B,
    mut rows: RowStream<'_, B::Row>,
) -> Result<B, RepositoryError> {
    while let Some(row) = rows.try_next().await? {
        builder.push(row)?;
    }
    Ok(builder)
}

/// Build an image only when its id, owning item and URL are all present.
///
/// Partially null triples are dropped without error.
fn decode_image(
    id: Option<ImageId>,
    item_id: Option<ItemId>,
    url: Option<String>,
) -> Option<Image> {
    match (id, item_id, url) {
        (Some(id), Some(item_id), Some(url)) => Some(Image { id, item_id, url }),
        _ => None,
    }
}

fn require<T>(
    value: Option<T>,
    entity: &'static str,
    id: i64,
    column: &'static str,
) -> Result<T, RowDecodeError> {
    value.ok_or(RowDecodeError::MissingColumn { entity, id, column })
}

// =============================================================================
// Cart graph
// =============================================================================

/// Materializes `Cart -> CartLine -> ItemSummary -> Image`.
#[derive(Debug, Default)]
pub struct CartGraph {
    carts: Vec<Cart>,
    cart_slots: HashMap<CartId, usize>,
    line_slots: HashMap<CartLineId, (usize, usize)>,
}

impl CartGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an in-memory row sequence.
    ///
    /// # Errors
    ///
    /// Returns the first `RowDecodeError`; no partial graph is returned.
    pub fn from_rows<I>(rows: I) -> Result<Self, RowDecodeError>
    where
        I: IntoIterator<Item = CartGraphRow>,
    {
        let mut graph = Self::new();
        for row in rows {
            graph.push(row)?;
        }
        Ok(graph)
    }

    /// Number of distinct carts seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.carts.len()
    }

    /// Whether no rows have been folded in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    /// All carts in first-seen order.
    #[must_use]
    pub fn into_carts(self) -> Vec<Cart> {
        self.carts
    }

    /// The first cart seen, for single-cart queries.
    #[must_use]
    pub fn into_single(self) -> Option<Cart> {
        self.carts.into_iter().next()
    }

    /// Return the arena slot for the row's cart, inserting it on first sight.
    fn cart_slot(&mut self, row: &CartGraphRow) -> Result<usize, RowDecodeError> {
        let payment_status = row
            .cart_payment_status
            .parse::<PaymentStatus>()
            .map_err(|reason| RowDecodeError::InvalidPaymentStatus {
                cart: row.cart_id,
                reason,
            })?;

        if let Some(&slot) = self.cart_slots.get(&row.cart_id) {
            return Ok(slot);
        }

        let slot = self.carts.len();
        self.carts.push(Cart {
            id: row.cart_id,
            user_id: row.cart_user_id,
            created_at: row.cart_created_at,
            total_price: Price::from_minor(row.cart_total_price.unwrap_or(0)),
            payment_method: row.cart_payment_method.clone(),
            payment_status,
            lines: Vec::new(),
        });
        self.cart_slots.insert(row.cart_id, slot);
        Ok(slot)
    }
}

fn decode_line(line_id: CartLineId, row: &mut CartGraphRow) -> Result<CartLine, RowDecodeError> {
    let id = line_id.as_i64();
    let item_id = require(row.item_id, "cart line", id, "item.id")?;

    Ok(CartLine {
        id: line_id,
        cart_id: require(row.line_cart_id, "cart line", id, "cart_items.cart_id")?,
        item_id: require(row.line_item_id, "cart line", id, "cart_items.item_id")?,
        quantity: require(row.line_quantity, "cart line", id, "cart_items.quantity")?,
        item: ItemSummary {
            id: item_id,
            name: require(row.item_name.take(), "cart line", id, "item.item_name")?,
            price: Price::from_minor(require(row.item_price, "cart line", id, "item.price")?),
            images: Vec::new(),
        },
    })
}

impl GraphBuilder for CartGraph {
    type Row = CartGraphRow;

    fn push(&mut self, mut row: CartGraphRow) -> Result<(), RowDecodeError> {
        let cart_slot = self.cart_slot(&row)?;

        // Left join found no line for this cart.
        let Some(line_id) = row.line_id else {
            return Ok(());
        };

        let line = decode_line(line_id, &mut row)?;

        let (cart_slot, line_slot) = if let Some(&slots) = self.line_slots.get(&line_id) {
            slots
        } else {
            let Some(cart) = self.carts.get_mut(cart_slot) else {
                return Ok(());
            };
            cart.lines.push(line);
            let slots = (cart_slot, cart.lines.len() - 1);
            self.line_slots.insert(line_id, slots);
            slots
        };

        if let Some(image) = decode_image(row.image_id, row.image_item_id, row.image_url.take())
            && let Some(line) = self
                .carts
                .get_mut(cart_slot)
                .and_then(|cart| cart.lines.get_mut(line_slot))
        {
            line.item.images.push(image);
        }

        Ok(())
    }
}

// =============================================================================
// Item graph
// =============================================================================

/// Materializes `Item -> Image`.
#[derive(Debug, Default)]
pub struct ItemGraph {
    items: Vec<Item>,
    item_slots: HashMap<ItemId, usize>,
}

impl ItemGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an in-memory row sequence.
    ///
    /// # Errors
    ///
    /// Returns the first `RowDecodeError`; no partial graph is returned.
    pub fn from_rows<I>(rows: I) -> Result<Self, RowDecodeError>
    where
        I: IntoIterator<Item = ItemGraphRow>,
    {
        let mut graph = Self::new();
        for row in rows {
            graph.push(row)?;
        }
        Ok(graph)
    }

    /// Number of distinct items seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no rows have been folded in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in first-seen order.
    #[must_use]
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// The first item seen, for single-item queries.
    #[must_use]
    pub fn into_single(self) -> Option<Item> {
        self.items.into_iter().next()
    }
}

impl GraphBuilder for ItemGraph {
    type Row = ItemGraphRow;

    fn push(&mut self, row: ItemGraphRow) -> Result<(), RowDecodeError> {
        let slot = if let Some(&slot) = self.item_slots.get(&row.item_id) {
            slot
        } else {
            let slot = self.items.len();
            self.items.push(Item {
                id: row.item_id,
                name: row.item_name,
                description: row.item_description,
                price: Price::from_minor(row.item_price),
                stock: row.item_stock,
                created_at: row.item_created_at,
                created_by: row.item_created_by,
                modified_at: row.item_modified_at,
                modified_by: row.item_modified_by,
                images: Vec::new(),
            });
            self.item_slots.insert(row.item_id, slot);
            slot
        };

        if let Some(image) = decode_image(row.image_id, row.image_item_id, row.image_url)
            && let Some(item) = self.items.get_mut(slot)
        {
            item.images.push(image);
        }

        Ok(())
    }
}
