//! The store traits the checkout coordinator and history projector
//! are written against.

use async_trait::async_trait;
use common::{BookId, CustomerId, Money, OrderId};

use crate::Result;
use crate::records::{Book, HistoryRow, OrderItemRow, OrderRow};

/// An in-flight checkout transaction.
///
/// All writes performed through a handle are invisible to other
/// transactions until [`CheckoutTx::commit`] returns `Ok`; dropping the
/// handle (or calling [`CheckoutTx::rollback`]) discards them. A book
/// row returned by [`CheckoutTx::lock_book`] stays locked against
/// concurrent conflicting writers until the transaction terminates —
/// this is the mechanism that serializes checkouts contending for the
/// same stock.
#[async_trait]
pub trait CheckoutTx: Send {
    /// Reads a book's current price and stock under an exclusive row
    /// lock. Returns `None` if the book does not exist. A bounded lock
    /// wait that expires surfaces as [`StoreError::Conflict`].
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// Stages an order header insert.
    async fn insert_order(&mut self, order: &OrderRow) -> Result<()>;

    /// Stages an order line item insert.
    async fn insert_line_item(&mut self, item: &OrderItemRow) -> Result<()>;

    /// Stages a stock decrement against a row previously locked with
    /// [`CheckoutTx::lock_book`].
    async fn decrement_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()>;

    /// Commits every staged write atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged write and releases all locks.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

impl std::fmt::Debug for dyn CheckoutTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CheckoutTx")
    }
}

/// The catalog store and order ledger, viewed as one storage backend.
///
/// Checkout writes go through [`OrderStore::begin_checkout`]; everything
/// else is a plain read (or a single-row catalog write used by seeding
/// and tests) that takes no transaction-scoped locks.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Opens an independent checkout transaction. Each call acquires its
    /// own session; concurrent checkouts never share a handle.
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>>;

    /// Reads the flat orders ⋈ order_items ⋈ books join for a customer,
    /// most recent order first, item order stable within an order.
    async fn history_rows(&self, customer_id: CustomerId) -> Result<Vec<HistoryRow>>;

    /// Inserts a catalog book (seeding / catalog maintenance).
    async fn insert_book(&self, book: &Book) -> Result<()>;

    /// Updates a book's current price. Returns false if the book does
    /// not exist. Never touches committed line-item price snapshots.
    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool>;

    /// Reads a single book without locking it.
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// Reads a committed order header.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRow>>;

    /// Reads a committed order's line items in insertion order.
    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>>;
}
