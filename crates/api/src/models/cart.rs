//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{CartId, CartLineId, ItemId, PaymentStatus, Price, UserId};

use super::item::ItemSummary;

/// A shopping cart with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    /// Unique cart ID.
    pub id: CartId,
    /// User who owns the cart.
    pub user_id: UserId,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// Total as stored at creation; zero when the column is null.
    pub total_price: Price,
    /// Payment method chosen by the user.
    pub payment_method: String,
    /// Whether the cart has been settled.
    pub payment_status: PaymentStatus,
    /// Cart lines in row-encounter order.
    #[serde(rename = "items")]
    pub lines: Vec<CartLine>,
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    /// Unique line ID.
    pub id: CartLineId,
    /// Cart that owns the line.
    pub cart_id: CartId,
    /// Referenced item.
    pub item_id: ItemId,
    /// Units ordered.
    pub quantity: i32,
    /// Snapshot of the referenced item at query time.
    pub item: ItemSummary,
}
