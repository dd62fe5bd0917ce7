//! Catalog domain types.
//!
//! These are the materialized shapes produced from the item graph query;
//! separate from the flat database row types in `db::rows`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{ImageId, ItemId, Price, UserId};

/// A catalog item with its images in row-encounter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Unique item ID.
    pub id: ItemId,
    /// Display name.
    #[serde(rename = "item_name")]
    pub name: String,
    /// Free-form description.
    #[serde(rename = "desc")]
    pub description: String,
    /// Unit price in minor currency units.
    pub price: Price,
    /// Units on hand.
    pub stock: i32,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// User who created the item.
    pub created_by: UserId,
    /// When the item was last modified.
    pub modified_at: DateTime<Utc>,
    /// User who last modified the item.
    pub modified_by: UserId,
    /// Item images.
    pub images: Vec<Image>,
}

/// An image attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    /// Unique image ID.
    pub id: ImageId,
    /// Item that owns this image.
    pub item_id: ItemId,
    /// Stored path, relative to the asset base URL.
    #[serde(rename = "image_url")]
    pub url: String,
}

/// The shallow item projection embedded in a cart line.
///
/// Joined at read time; not a stored copy of the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    /// Item ID.
    pub id: ItemId,
    /// Display name.
    #[serde(rename = "item_name")]
    pub name: String,
    /// Unit price in minor currency units.
    pub price: Price,
    /// Item images.
    pub images: Vec<Image>,
}
