//! Cart settlement.
//!
//! Settling a cart runs three statements in one transaction:
//!
//! 1. mark the cart `Paid` (only if it is still `Pending`)
//! 2. subtract every line's quantity from its item's stock
//! 3. count items whose stock went below zero
//!
//! Stock is decremented optimistically and checked afterwards; a non-zero
//! count from step 3 rolls everything back. No failure path leaves the cart
//! paid or any stock changed.

use thiserror::Error;
use tracing::instrument;

use cartwheel_core::CartId;

use super::RepositoryError;
use super::store::{CartStore, SettlementTx};

/// Why a settlement did not commit.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The store failed to begin, execute or commit.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Committing would have left stock below zero.
    #[error("insufficient stock for {items} item(s)")]
    InsufficientStock { items: i64 },

    /// No cart has this id.
    #[error("cart {0} not found")]
    CartNotFound(CartId),

    /// The cart has already been settled.
    #[error("cart {0} is already paid")]
    AlreadyPaid(CartId),
}

/// Runs settlements against a [`CartStore`].
pub struct SettlementTransactor<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CartStore + ?Sized> SettlementTransactor<'a, S> {
    /// Create a new transactor.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Settle a cart: mark it paid and take its lines out of stock.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::CartNotFound` or `SettlementError::AlreadyPaid`
    /// if the cart cannot be marked paid.
    /// Returns `SettlementError::InsufficientStock` if any item's stock would
    /// go negative.
    /// Returns `SettlementError::Repository` if the store fails.
    #[instrument(skip_all, fields(cart_id = %cart_id))]
    pub async fn settle(&self, cart_id: CartId) -> Result<(), SettlementError> {
        let mut tx = self.store.begin_settlement().await?;

        match run(tx.as_mut(), cart_id).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!("cart settled");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "settlement rollback failed");
                }
                match &err {
                    SettlementError::Repository(e) => {
                        tracing::error!(error = %e, "settlement failed");
                    }
                    rejection => tracing::warn!(reason = %rejection, "settlement rejected"),
                }
                Err(err)
            }
        }
    }
}

async fn run(tx: &mut dyn SettlementTx, cart_id: CartId) -> Result<(), SettlementError> {
    if tx.mark_paid(cart_id).await? == 0 {
        return Err(match tx.cart_status(cart_id).await? {
            None => SettlementError::CartNotFound(cart_id),
            Some(_) => SettlementError::AlreadyPaid(cart_id),
        });
    }

    let updated = tx.decrement_stock(cart_id).await?;
    tracing::debug!(updated, "stock decremented");

    let negative = tx.count_negative_stock().await?;
    if negative > 0 {
        return Err(SettlementError::InsufficientStock { items: negative });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use cartwheel_core::{CartLineId, ItemId, PaymentStatus, Price, UserId, UserRole, Username};

    use super::*;
    use crate::db::MemoryStore;
    use crate::db::store::{CatalogStore, NewCart, NewCartLine, NewItem, NewUser, UserStore};

    const A: ItemId = ItemId::new(1);
    const B: ItemId = ItemId::new(2);
    const CART: CartId = CartId::new(100);

    async fn store_with(stock_a: i32, stock_b: i32) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser {
                id: UserId::new(1),
                username: Username::parse("buyer").unwrap(),
                password_hash: "x".to_owned(),
                role: UserRole::User,
            })
            .await
            .unwrap();
        for (id, stock) in [(A, stock_a), (B, stock_b)] {
            store
                .insert_item(NewItem {
                    id,
                    name: format!("item-{id}"),
                    description: String::new(),
                    price: Price::from_minor(100),
                    stock,
                    created_by: UserId::new(1),
                    created_at: Utc::now(),
                    images: Vec::new(),
                })
                .await
                .unwrap();
        }
        store
    }

    async fn add_cart(store: &MemoryStore, lines: &[(i64, ItemId, i32)]) {
        store
            .insert_cart(NewCart {
                id: CART,
                user_id: UserId::new(1),
                created_at: Utc::now(),
                total_price: Some(Price::from_minor(400)),
                payment_method: "card".to_owned(),
                lines: lines
                    .iter()
                    .map(|&(id, item_id, quantity)| NewCartLine {
                        id: CartLineId::new(id),
                        item_id,
                        quantity,
                    })
                    .collect(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let store = store_with(5, 0).await;
        add_cart(&store, &[(1, A, 3), (2, B, 1)]).await;

        let err = SettlementTransactor::new(&store).settle(CART).await.unwrap_err();

        assert!(matches!(err, SettlementError::InsufficientStock { items: 1 }));
        assert_eq!(store.item_stock(A).await, Some(5));
        assert_eq!(store.item_stock(B).await, Some(0));
        assert_eq!(store.payment_status(CART).await, Some(PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_sufficient_stock_commits() {
        let store = store_with(5, 2).await;
        add_cart(&store, &[(1, A, 3), (2, B, 1)]).await;

        SettlementTransactor::new(&store).settle(CART).await.unwrap();

        assert_eq!(store.item_stock(A).await, Some(2));
        assert_eq!(store.item_stock(B).await, Some(1));
        assert_eq!(store.payment_status(CART).await, Some(PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_lines_for_same_item_are_summed() {
        let store = store_with(5, 0).await;
        add_cart(&store, &[(1, A, 2), (2, A, 2)]).await;

        SettlementTransactor::new(&store).settle(CART).await.unwrap();

        assert_eq!(store.item_stock(A).await, Some(1));
    }

    #[tokio::test]
    async fn test_lines_for_same_item_exceeding_stock_reject() {
        let store = store_with(3, 0).await;
        add_cart(&store, &[(1, A, 2), (2, A, 2)]).await;

        let err = SettlementTransactor::new(&store).settle(CART).await.unwrap_err();

        assert!(matches!(err, SettlementError::InsufficientStock { .. }));
        assert_eq!(store.item_stock(A).await, Some(3));
    }

    #[tokio::test]
    async fn test_quantities_past_i32_reject_as_insufficient_stock() {
        let store = store_with(5, 2).await;
        add_cart(&store, &[(1, A, i32::MAX), (2, A, i32::MAX)]).await;

        let err = SettlementTransactor::new(&store).settle(CART).await.unwrap_err();

        assert!(matches!(err, SettlementError::InsufficientStock { items: 1 }));
        assert_eq!(store.item_stock(A).await, Some(5));
        assert_eq!(store.payment_status(CART).await, Some(PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_unknown_cart() {
        let store = store_with(5, 2).await;

        let err = SettlementTransactor::new(&store)
            .settle(CartId::new(404))
            .await
            .unwrap_err();

        assert!(matches!(err, SettlementError::CartNotFound(id) if id == CartId::new(404)));
    }

    #[tokio::test]
    async fn test_second_settlement_is_rejected() {
        let store = store_with(5, 2).await;
        add_cart(&store, &[(1, A, 1)]).await;
        let transactor = SettlementTransactor::new(&store);

        transactor.settle(CART).await.unwrap();
        let err = transactor.settle(CART).await.unwrap_err();

        assert!(matches!(err, SettlementError::AlreadyPaid(_)));
        assert_eq!(store.item_stock(A).await, Some(4));
    }

    #[tokio::test]
    async fn test_empty_cart_settles_without_stock_change() {
        let store = store_with(5, 2).await;
        add_cart(&store, &[]).await;

        SettlementTransactor::new(&store).settle(CART).await.unwrap();

        assert_eq!(store.item_stock(A).await, Some(5));
        assert_eq!(store.payment_status(CART).await, Some(PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_concurrent_settlements_serialize() {
        let store = store_with(1, 0).await;
        add_cart(&store, &[(1, A, 1)]).await;
        store
            .insert_cart(NewCart {
                id: CartId::new(200),
                user_id: UserId::new(1),
                created_at: Utc::now(),
                total_price: None,
                payment_method: "card".to_owned(),
                lines: vec![NewCartLine {
                    id: CartLineId::new(3),
                    item_id: A,
                    quantity: 1,
                }],
            })
            .await
            .unwrap();

        let transactor = SettlementTransactor::new(&store);
        let (first, second) = tokio::join!(
            transactor.settle(CART),
            transactor.settle(CartId::new(200))
        );

        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        assert_eq!(store.item_stock(A).await, Some(0));
    }

    mod failing_store {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use async_trait::async_trait;
        use futures::{StreamExt, stream};

        use super::*;
        use crate::db::rows::CartGraphRow;
        use crate::db::store::{CartScope, RowStream};

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Step {
            Decrement,
            Count,
            Commit,
        }

        #[derive(Default)]
        struct Calls {
            commits: AtomicUsize,
            rollbacks: AtomicUsize,
        }

        /// Cart store whose settlement transaction fails at one step.
        struct FailingStore {
            fail_at: Step,
            calls: Arc<Calls>,
        }

        impl FailingStore {
            fn new(fail_at: Step) -> Self {
                Self {
                    fail_at,
                    calls: Arc::new(Calls::default()),
                }
            }

            fn commits(&self) -> usize {
                self.calls.commits.load(Ordering::SeqCst)
            }

            fn rollbacks(&self) -> usize {
                self.calls.rollbacks.load(Ordering::SeqCst)
            }
        }

        struct FailingTx {
            fail_at: Step,
            calls: Arc<Calls>,
        }

        impl FailingTx {
            fn check(&self, step: Step) -> Result<(), RepositoryError> {
                if self.fail_at == step {
                    Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(())
                }
            }
        }

        #[async_trait]
        impl CartStore for FailingStore {
            fn cart_rows(&self, _scope: CartScope) -> RowStream<'_, CartGraphRow> {
                stream::empty().boxed()
            }

            async fn insert_cart(&self, _cart: NewCart) -> Result<(), RepositoryError> {
                Ok(())
            }

            async fn delete_cart(&self, _id: CartId) -> Result<u64, RepositoryError> {
                Ok(0)
            }

            async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
                Ok(Box::new(FailingTx {
                    fail_at: self.fail_at,
                    calls: Arc::clone(&self.calls),
                }))
            }
        }

        #[async_trait]
        impl SettlementTx for FailingTx {
            async fn mark_paid(&mut self, _cart: CartId) -> Result<u64, RepositoryError> {
                Ok(1)
            }

            async fn cart_status(
                &mut self,
                _cart: CartId,
            ) -> Result<Option<PaymentStatus>, RepositoryError> {
                Ok(Some(PaymentStatus::Pending))
            }

            async fn decrement_stock(&mut self, _cart: CartId) -> Result<u64, RepositoryError> {
                self.check(Step::Decrement)?;
                Ok(1)
            }

            async fn count_negative_stock(&mut self) -> Result<i64, RepositoryError> {
                self.check(Step::Count)?;
                Ok(0)
            }

            async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
                self.calls.commits.fetch_add(1, Ordering::SeqCst);
                self.check(Step::Commit)
            }

            async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
                self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        #[tokio::test]
        async fn test_failed_step_rolls_back_once() {
            for step in [Step::Decrement, Step::Count] {
                let store = FailingStore::new(step);

                let err = SettlementTransactor::new(&store).settle(CART).await.unwrap_err();

                assert!(
                    matches!(err, SettlementError::Repository(RepositoryError::Database(_))),
                    "{step:?}"
                );
                assert_eq!(store.rollbacks(), 1, "{step:?}");
                assert_eq!(store.commits(), 0, "{step:?}");
            }
        }

        #[tokio::test]
        async fn test_failed_commit_is_reported() {
            let store = FailingStore::new(Step::Commit);

            let err = SettlementTransactor::new(&store).settle(CART).await.unwrap_err();

            assert!(matches!(err, SettlementError::Repository(_)));
            assert_eq!(store.commits(), 1);
            assert_eq!(store.rollbacks(), 0);
        }
    }
}
