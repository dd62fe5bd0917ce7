//! Flat row types for the left-joined graph queries.
//!
//! Every joined column is an `Option`: absence is how a left join reports
//! "no matching row", so it must survive decoding. Rows are decoded by
//! position, in the exact projection order of the graph queries in
//! `db::postgres`; a row with the wrong arity is rejected before any column
//! is read.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use cartwheel_core::{CartId, CartLineId, ImageId, ItemId, UserId};

/// One row of `carts ⋈ cart_items ⋈ items ⋈ items_images`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartGraphRow {
    pub cart_id: CartId,
    pub cart_user_id: UserId,
    pub cart_created_at: DateTime<Utc>,
    pub cart_total_price: Option<i64>,
    pub cart_payment_method: String,
    pub cart_payment_status: String,
    pub line_id: Option<CartLineId>,
    pub line_cart_id: Option<CartId>,
    pub line_item_id: Option<ItemId>,
    pub line_quantity: Option<i32>,
    pub item_id: Option<ItemId>,
    pub item_name: Option<String>,
    pub item_price: Option<i64>,
    pub image_id: Option<ImageId>,
    pub image_item_id: Option<ItemId>,
    pub image_url: Option<String>,
}

impl CartGraphRow {
    /// Number of projected columns.
    pub const ARITY: usize = 16;
}

/// One row of `items ⋈ items_images`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemGraphRow {
    pub item_id: ItemId,
    pub item_name: String,
    pub item_description: String,
    pub item_price: i64,
    pub item_stock: i32,
    pub item_created_at: DateTime<Utc>,
    pub item_created_by: UserId,
    pub item_modified_at: DateTime<Utc>,
    pub item_modified_by: UserId,
    pub image_id: Option<ImageId>,
    pub image_item_id: Option<ItemId>,
    pub image_url: Option<String>,
}

impl ItemGraphRow {
    /// Number of projected columns.
    pub const ARITY: usize = 12;
}

fn check_arity(row: &PgRow, expected: usize) -> Result<(), sqlx::Error> {
    if row.len() == expected {
        Ok(())
    } else {
        Err(sqlx::Error::ColumnIndexOutOfBounds {
            index: expected - 1,
            len: row.len(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CartGraphRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        check_arity(row, Self::ARITY)?;

        Ok(Self {
            cart_id: row.try_get(0)?,
            cart_user_id: row.try_get(1)?,
            cart_created_at: row.try_get(2)?,
            cart_total_price: row.try_get(3)?,
            cart_payment_method: row.try_get(4)?,
            cart_payment_status: row.try_get(5)?,
            line_id: row.try_get(6)?,
            line_cart_id: row.try_get(7)?,
            line_item_id: row.try_get(8)?,
            line_quantity: row.try_get(9)?,
            item_id: row.try_get(10)?,
            item_name: row.try_get(11)?,
            item_price: row.try_get(12)?,
            image_id: row.try_get(13)?,
            image_item_id: row.try_get(14)?,
            image_url: row.try_get(15)?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ItemGraphRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        check_arity(row, Self::ARITY)?;

        Ok(Self {
            item_id: row.try_get(0)?,
            item_name: row.try_get(1)?,
            item_description: row.try_get(2)?,
            item_price: row.try_get(3)?,
            item_stock: row.try_get(4)?,
            item_created_at: row.try_get(5)?,
            item_created_by: row.try_get(6)?,
            item_modified_at: row.try_get(7)?,
            item_modified_by: row.try_get(8)?,
            image_id: row.try_get(9)?,
            image_item_id: row.try_get(10)?,
            image_url: row.try_get(11)?,
        })
    }
}
