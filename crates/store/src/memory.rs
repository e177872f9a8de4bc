//! In-memory store implementation for testing.
//!
//! The whole store sits behind one asynchronous mutex: a checkout
//! transaction owns the lock from `begin_checkout` until commit or
//! rollback, which serializes concurrent checkouts exactly like row
//! locks do in PostgreSQL (coarser, but sufficient for tests). The
//! bounded lock acquisition wait plays the role of `lock_timeout`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{BookId, CustomerId, Money, OrderId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::records::{Book, HistoryRow, OrderItemRow, OrderRow};
use crate::store::{CheckoutTx, OrderStore};
use crate::{Result, StoreError};

const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct MemState {
    books: HashMap<BookId, Book>,
    orders: Vec<OrderRow>,
    items: Vec<OrderItemRow>,
}

/// In-memory catalog store + order ledger.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemState>>,
    lock_wait: Duration,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Overrides the bounded wait for acquiring the checkout lock.
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A checkout transaction holding the store lock.
///
/// Writes are staged and only applied to the shared state on commit;
/// dropping the transaction releases the lock with nothing applied.
struct MemCheckoutTx {
    guard: OwnedMutexGuard<MemState>,
    staged_orders: Vec<OrderRow>,
    staged_items: Vec<OrderItemRow>,
    staged_decrements: Vec<(BookId, u32)>,
}

#[async_trait]
impl CheckoutTx for MemCheckoutTx {
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.guard.books.get(&book_id).cloned())
    }

    async fn insert_order(&mut self, order: &OrderRow) -> Result<()> {
        self.staged_orders.push(order.clone());
        Ok(())
    }

    async fn insert_line_item(&mut self, item: &OrderItemRow) -> Result<()> {
        self.staged_items.push(item.clone());
        Ok(())
    }

    async fn decrement_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()> {
        self.staged_decrements.push((book_id, quantity));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        // Backstop mirroring the schema's CHECK (stock >= 0): the sum of
        // staged decrements per book must not exceed its stock.
        let mut totals: HashMap<BookId, i64> = HashMap::new();
        for &(book_id, quantity) in &self.staged_decrements {
            *totals.entry(book_id).or_insert(0) += i64::from(quantity);
        }
        for (book_id, total) in totals {
            let Some(book) = self.guard.books.get(&book_id) else {
                return Err(StoreError::CorruptRow(format!(
                    "stock decrement for missing book {book_id}"
                )));
            };
            if book.stock < total {
                return Err(StoreError::CorruptRow(format!(
                    "unvalidated stock decrement of {total} for book {book_id}"
                )));
            }
        }

        for (book_id, quantity) in std::mem::take(&mut self.staged_decrements) {
            if let Some(book) = self.guard.books.get_mut(&book_id) {
                book.stock -= i64::from(quantity);
            }
        }
        let orders = std::mem::take(&mut self.staged_orders);
        let items = std::mem::take(&mut self.staged_items);
        self.guard.orders.extend(orders);
        self.guard.items.extend(items);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Dropping the guard releases the lock; staged writes vanish.
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>> {
        let guard = tokio::time::timeout(self.lock_wait, self.state.clone().lock_owned())
            .await
            .map_err(|_| StoreError::Conflict("checkout lock wait timed out".to_string()))?;

        Ok(Box::new(MemCheckoutTx {
            guard,
            staged_orders: Vec::new(),
            staged_items: Vec::new(),
            staged_decrements: Vec::new(),
        }))
    }

    async fn history_rows(&self, customer_id: CustomerId) -> Result<Vec<HistoryRow>> {
        let state = self.state.lock().await;

        let mut orders: Vec<&OrderRow> = state
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        // Most recent first, order id as a deterministic tiebreak.
        orders.sort_by(|a, b| {
            b.order_date
                .cmp(&a.order_date)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let mut rows = Vec::new();
        for order in orders {
            for item in state.items.iter().filter(|i| i.order_id == order.id) {
                let Some(book) = state.books.get(&item.book_id) else {
                    continue;
                };
                rows.push(HistoryRow {
                    order_id: order.id,
                    order_date: order.order_date,
                    total_amount: order.total_amount,
                    status: order.status,
                    book_id: item.book_id,
                    title: book.title.clone(),
                    isbn: book.isbn.clone(),
                    quantity: item.quantity,
                    price_at_time_of_order: item.price_at_time_of_order,
                });
            }
        }
        Ok(rows)
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        self.state
            .lock()
            .await
            .books
            .insert(book.id, book.clone());
        Ok(())
    }

    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.books.get_mut(&book_id) {
            Some(book) => {
                book.price = price;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.lock().await.books.get(&book_id).cloned())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRow>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>> {
        Ok(self
            .state
            .lock()
            .await
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::OrderStatus;

    fn sample_book(stock: i64) -> Book {
        Book {
            id: BookId::new(),
            title: "The Rust Programming Language".to_string(),
            isbn: "978-1718503106".to_string(),
            price: Money::from_cents(3999),
            publication_year: 2023,
            stock,
        }
    }

    fn sample_order(customer_id: CustomerId, total: Money) -> OrderRow {
        OrderRow {
            id: OrderId::new(),
            customer_id,
            shipping_address: "1 Main St".to_string(),
            total_amount: total,
            status: OrderStatus::Pending,
            order_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let book = sample_book(5);
        store.insert_book(&book).await.unwrap();

        let customer = CustomerId::new();
        let order = sample_order(customer, Money::from_cents(3999));

        let mut tx = store.begin_checkout().await.unwrap();
        let locked = tx.lock_book(book.id).await.unwrap().unwrap();
        assert_eq!(locked.stock, 5);
        tx.insert_order(&order).await.unwrap();
        tx.insert_line_item(&OrderItemRow {
            order_id: order.id,
            book_id: book.id,
            quantity: 1,
            price_at_time_of_order: locked.price,
        })
        .await
        .unwrap();
        tx.decrement_stock(book.id, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_book(book.id).await.unwrap().unwrap().stock, 4);
        assert!(store.get_order(order.id).await.unwrap().is_some());
        assert_eq!(store.get_order_items(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = InMemoryStore::new();
        let book = sample_book(5);
        store.insert_book(&book).await.unwrap();

        let order = sample_order(CustomerId::new(), Money::zero());

        let mut tx = store.begin_checkout().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        tx.decrement_stock(book.id, 3).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.get_book(book.id).await.unwrap().unwrap().stock, 5);
        assert!(store.get_order(order.id).await.unwrap().is_none());
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn second_checkout_times_out_while_first_holds_the_lock() {
        let store = InMemoryStore::new().with_lock_wait(Duration::from_millis(50));

        let _held = store.begin_checkout().await.unwrap();
        let err = store.begin_checkout().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn lock_is_released_after_commit() {
        let store = InMemoryStore::new().with_lock_wait(Duration::from_millis(50));

        let tx = store.begin_checkout().await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.begin_checkout().await.is_ok());
    }

    #[tokio::test]
    async fn history_rows_orders_most_recent_first() {
        let store = InMemoryStore::new();
        let book = sample_book(100);
        store.insert_book(&book).await.unwrap();

        let customer = CustomerId::new();
        let mut older = sample_order(customer, Money::from_cents(3999));
        older.order_date = Utc::now() - chrono::Duration::days(1);
        let newer = sample_order(customer, Money::from_cents(7998));

        for order in [&older, &newer] {
            let mut tx = store.begin_checkout().await.unwrap();
            tx.insert_order(order).await.unwrap();
            tx.insert_line_item(&OrderItemRow {
                order_id: order.id,
                book_id: book.id,
                quantity: 1,
                price_at_time_of_order: book.price,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let rows = store.history_rows(customer).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_id, newer.id);
        assert_eq!(rows[1].order_id, older.id);
        assert_eq!(rows[0].title, book.title);
    }

    #[tokio::test]
    async fn history_rows_excludes_other_customers() {
        let store = InMemoryStore::new();
        let book = sample_book(10);
        store.insert_book(&book).await.unwrap();

        let mine = CustomerId::new();
        let theirs = CustomerId::new();
        for customer in [mine, theirs] {
            let order = sample_order(customer, Money::from_cents(3999));
            let mut tx = store.begin_checkout().await.unwrap();
            tx.insert_order(&order).await.unwrap();
            tx.insert_line_item(&OrderItemRow {
                order_id: order.id,
                book_id: book.id,
                quantity: 1,
                price_at_time_of_order: book.price,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let rows = store.history_rows(mine).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
