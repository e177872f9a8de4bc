//! The atomic checkout protocol.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::Utc;
use common::{BookId, CustomerId, Money, OrderId, OrderStatus};
use store::{CheckoutTx, OrderItemRow, OrderRow, OrderStore};

use crate::cart::Cart;
use crate::error::CheckoutError;

/// Default number of whole-operation attempts on transaction conflicts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The durable outcome of a successful checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedOrder {
    /// Identifier of the created order.
    pub order_id: OrderId,
    /// Total computed by the coordinator from locked catalog prices.
    pub total_amount: Money,
}

/// A book's price and uncommitted remaining stock, read once under the
/// row lock and reused for every cart line that references it.
struct LockedBook {
    price: Money,
    remaining: i64,
}

/// Executes multi-line checkouts with all-or-nothing semantics.
///
/// Every `place_order` call runs in its own transaction acquired from
/// the store; conflicting checkouts serialize on the per-book row lock
/// and lock waits are bounded, so contention surfaces as a retryable
/// conflict rather than an unbounded block.
pub struct CheckoutCoordinator<S: OrderStore> {
    store: S,
    max_attempts: u32,
}

impl<S: OrderStore> CheckoutCoordinator<S> {
    /// Creates a coordinator over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the bounded number of whole-operation attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Places an order for the whole cart, atomically.
    ///
    /// On success one order header, one line item per cart line, and the
    /// matching stock decrements are durably committed together. On any
    /// error the transaction is rolled back before returning — no
    /// observer ever sees a partial write. Only transaction conflicts
    /// are retried, and always as the whole operation.
    #[tracing::instrument(skip(self, cart), fields(lines = cart.lines().len()))]
    pub async fn place_order(
        &self,
        customer_id: CustomerId,
        shipping_address: &str,
        cart: &Cart,
    ) -> Result<PlacedOrder, CheckoutError> {
        if shipping_address.trim().is_empty() {
            return Err(CheckoutError::InvalidCart(
                "shipping address is required".to_string(),
            ));
        }

        metrics::counter!("checkout_attempts_total").increment(1);
        let start = std::time::Instant::now();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_place(customer_id, shipping_address, cart).await {
                Ok(placed) => {
                    metrics::histogram!("checkout_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    metrics::counter!("orders_placed_total").increment(1);
                    tracing::info!(
                        order_id = %placed.order_id,
                        total = %placed.total_amount,
                        attempt,
                        "order placed"
                    );
                    return Ok(placed);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    metrics::counter!("checkout_conflicts_total").increment(1);
                    tracing::warn!(attempt, error = %err, "checkout conflicted, retrying");
                    let backoff = std::time::Duration::from_millis(25 * u64::from(attempt));
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        metrics::counter!("checkout_conflicts_total").increment(1);
                        tracing::warn!(attempt, error = %err, "checkout retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One attempt: a single transaction with a single terminal outcome.
    async fn try_place(
        &self,
        customer_id: CustomerId,
        shipping_address: &str,
        cart: &Cart,
    ) -> Result<PlacedOrder, CheckoutError> {
        let mut tx = self.store.begin_checkout().await?;

        match run_protocol(tx.as_mut(), customer_id, shipping_address, cart).await {
            Ok(placed) => {
                tx.commit().await?;
                Ok(placed)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed after checkout error");
                }
                Err(err)
            }
        }
    }
}

/// Steps 2–8 of the checkout protocol, inside an open transaction.
/// Any `Err` return leaves the rollback to the caller.
async fn run_protocol(
    tx: &mut dyn CheckoutTx,
    customer_id: CustomerId,
    shipping_address: &str,
    cart: &Cart,
) -> Result<PlacedOrder, CheckoutError> {
    // Lock each distinct book once; validate every line against the
    // remaining stock so duplicate lines cannot cumulatively oversell.
    let mut locked: HashMap<BookId, LockedBook> = HashMap::new();
    let mut snapshots: Vec<Money> = Vec::with_capacity(cart.lines().len());
    let mut total = Money::zero();

    for line in cart.lines() {
        let book = match locked.entry(line.book_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let Some(row) = tx.lock_book(line.book_id).await? else {
                    return Err(CheckoutError::UnknownBook(line.book_id));
                };
                entry.insert(LockedBook {
                    price: row.price,
                    remaining: row.stock,
                })
            }
        };

        if i64::from(line.quantity) > book.remaining {
            return Err(CheckoutError::InsufficientStock {
                book_id: line.book_id,
                requested: line.quantity,
                available: book.remaining,
            });
        }
        book.remaining -= i64::from(line.quantity);

        total = total + book.price.multiply(line.quantity);
        snapshots.push(book.price);
    }

    let order = OrderRow {
        id: OrderId::new(),
        customer_id,
        shipping_address: shipping_address.to_string(),
        total_amount: total,
        status: OrderStatus::Pending,
        order_date: Utc::now(),
    };
    tx.insert_order(&order).await?;

    for (line, price) in cart.lines().iter().zip(snapshots) {
        tx.insert_line_item(&OrderItemRow {
            order_id: order.id,
            book_id: line.book_id,
            quantity: line.quantity,
            price_at_time_of_order: price,
        })
        .await?;
    }

    for line in cart.lines() {
        tx.decrement_stock(line.book_id, line.quantity).await?;
    }

    Ok(PlacedOrder {
        order_id: order.id,
        total_amount: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;
    use store::InMemoryStore;

    #[tokio::test]
    async fn blank_shipping_address_is_rejected_before_any_write() {
        let store = InMemoryStore::new();
        let coordinator = CheckoutCoordinator::new(store.clone());
        let cart = Cart::new(vec![CartLine {
            book_id: BookId::new(),
            quantity: 1,
        }])
        .unwrap();

        let err = coordinator
            .place_order(CustomerId::new(), "   ", &cart)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidCart(_)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_book_fails_the_whole_cart() {
        let store = InMemoryStore::new();
        let coordinator = CheckoutCoordinator::new(store.clone());
        let cart = Cart::new(vec![CartLine {
            book_id: BookId::new(),
            quantity: 1,
        }])
        .unwrap();

        let err = coordinator
            .place_order(CustomerId::new(), "1 Main St", &cart)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownBook(_)));
        assert_eq!(store.order_count().await, 0);
    }
}
