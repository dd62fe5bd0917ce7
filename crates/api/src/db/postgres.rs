//! `PostgreSQL` store.
//!
//! Queries are checked at runtime (`sqlx::query`/`query_as`) so the crate
//! builds without a live database. The graph queries project columns in the
//! fixed order [`super::rows`] decodes by position, and order their output so
//! first-seen order is deterministic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use sqlx::{PgPool, Postgres, Transaction};

use cartwheel_core::{CartId, ItemId, PaymentStatus, UserId, UserRole, Username};

use super::RepositoryError;
use super::rows::{CartGraphRow, ItemGraphRow};
use super::store::{
    CartScope, CartStore, CatalogStore, ItemScope, ItemUpdate, NewCart, NewItem, NewUser,
    RowStream, SettlementTx, Store, UserRecord, UserStore,
};

macro_rules! cart_graph_query {
    ($filter:literal) => {
        concat!(
            r"
            SELECT c.id, c.user_id, c.created_at, c.total_price,
                   c.payment_method, c.payment_status,
                   ci.id, ci.cart_id, ci.item_id, ci.quantity,
                   i.id, i.item_name, i.price,
                   im.id, im.item_id, im.image_url
            FROM carts c
            LEFT JOIN cart_items ci ON ci.cart_id = c.id
            LEFT JOIN items i ON i.id = ci.item_id
            LEFT JOIN items_images im ON im.item_id = i.id
            ",
            $filter,
            "
            ORDER BY c.created_at, c.id, ci.id, im.id
            "
        )
    };
}

macro_rules! item_graph_query {
    ($filter:literal) => {
        concat!(
            r"
            SELECT i.id, i.item_name, i.description, i.price, i.stock,
                   i.created_at, i.created_by, i.modified_at, i.modified_by,
                   im.id, im.item_id, im.image_url
            FROM items i
            LEFT JOIN items_images im ON im.item_id = i.id
            ",
            $filter,
            "
            ORDER BY i.created_at, i.id, im.id
            "
        )
    };
}

/// Subtracts each item's total quantity in the cart. Lines are summed first
/// because `UPDATE ... FROM` applies only one joined row per target row.
/// The sum stays `BIGINT`; any shortfall is clamped to `-1` so an oversized
/// cart is counted as negative stock instead of failing the cast.
const DECREMENT_STOCK: &str = r"
    UPDATE items
    SET stock = GREATEST(items.stock::BIGINT - lines.quantity, -1)::INTEGER
    FROM (
        SELECT item_id, SUM(quantity) AS quantity
        FROM cart_items
        WHERE cart_id = $1
        GROUP BY item_id
    ) AS lines
    WHERE items.id = lines.item_id
";

const USER_COLUMNS: &str = "id, username, password_hash, role, access_token, token_expires_at";

/// Map constraint violations to `Conflict`, everything else through `From`.
fn constraint_error(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(format!("{what}: {}", db_err.message()));
    }
    RepositoryError::from(err)
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    password_hash: String,
    role: String,
    access_token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let role = row.role.parse::<UserRole>().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            password_hash: row.password_hash,
            role,
            access_token: row.access_token,
            token_expires_at: row.token_expires_at,
        })
    }
}

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    fn item_rows(&self, scope: ItemScope) -> RowStream<'_, ItemGraphRow> {
        let rows = match scope {
            ItemScope::All => sqlx::query_as::<_, ItemGraphRow>(item_graph_query!(""))
                .fetch(&self.pool),
            ItemScope::ById(id) => {
                sqlx::query_as::<_, ItemGraphRow>(item_graph_query!("WHERE i.id = $1"))
                    .bind(id)
                    .fetch(&self.pool)
            }
        };
        rows.map_err(RepositoryError::from).boxed()
    }

    async fn insert_item(&self, item: NewItem) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO items (id, item_name, description, price, stock,
                               created_at, created_by, modified_at, modified_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $7)
            ",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.minor_units())
        .bind(item.stock)
        .bind(item.created_at)
        .bind(item.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "insert item"))?;

        for image in &item.images {
            sqlx::query("INSERT INTO items_images (id, item_id, image_url) VALUES ($1, $2, $3)")
                .bind(image.id)
                .bind(item.id)
                .bind(&image.url)
                .execute(&mut *tx)
                .await
                .map_err(|e| constraint_error(e, "insert item image"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE items
            SET item_name = $2, description = $3, price = $4, stock = $5,
                modified_at = $6, modified_by = $7
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price.minor_units())
        .bind(update.stock)
        .bind(update.modified_at)
        .bind(update.modified_by)
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "update item"))?;

        Ok(result.rows_affected())
    }

    async fn delete_item(&self, id: ItemId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, "delete item"))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CartStore for PgStore {
    fn cart_rows(&self, scope: CartScope) -> RowStream<'_, CartGraphRow> {
        let rows = match scope {
            CartScope::All => {
                sqlx::query_as::<_, CartGraphRow>(cart_graph_query!("")).fetch(&self.pool)
            }
            CartScope::ById(id) => {
                sqlx::query_as::<_, CartGraphRow>(cart_graph_query!("WHERE c.id = $1"))
                    .bind(id)
                    .fetch(&self.pool)
            }
            CartScope::ByUser(user) => {
                sqlx::query_as::<_, CartGraphRow>(cart_graph_query!("WHERE c.user_id = $1"))
                    .bind(user)
                    .fetch(&self.pool)
            }
        };
        rows.map_err(RepositoryError::from).boxed()
    }

    async fn insert_cart(&self, cart: NewCart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO carts (id, user_id, created_at, total_price, payment_method, payment_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(cart.created_at)
        .bind(cart.total_price.map(|p| p.minor_units()))
        .bind(&cart.payment_method)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, "insert cart"))?;

        for line in &cart.lines {
            sqlx::query(
                "INSERT INTO cart_items (id, cart_id, item_id, quantity) VALUES ($1, $2, $3, $4)",
            )
            .bind(line.id)
            .bind(cart.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| constraint_error(e, "insert cart line"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, id: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSettlementTx { tx }))
    }
}

/// Settlement transaction over a pooled connection.
///
/// Dropping an uncommitted `sqlx::Transaction` rolls it back.
struct PgSettlementTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SettlementTx for PgSettlementTx {
    async fn mark_paid(&mut self, cart: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE carts SET payment_status = $2 WHERE id = $1 AND payment_status = $3",
        )
        .bind(cart)
        .bind(PaymentStatus::Paid.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn cart_status(&mut self, cart: CartId) -> Result<Option<PaymentStatus>, RepositoryError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT payment_status FROM carts WHERE id = $1")
                .bind(cart)
                .fetch_optional(&mut *self.tx)
                .await?;

        status
            .map(|s| {
                s.parse::<PaymentStatus>()
                    .map_err(RepositoryError::DataCorruption)
            })
            .transpose()
    }

    async fn decrement_stock(&mut self, cart: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(DECREMENT_STOCK)
            .bind(cart)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_negative_stock(&mut self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE stock < 0")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("username already exists".to_owned());
            }
            RepositoryError::from(e)
        })?;

        Ok(())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn assign_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET access_token = $2, token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE access_token = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRecord::try_from).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_never_casts_the_sum() {
        assert!(!DECREMENT_STOCK.contains("SUM(quantity)::INTEGER"));
        assert!(DECREMENT_STOCK.contains("GREATEST(items.stock::BIGINT - lines.quantity, -1)"));
    }
}
