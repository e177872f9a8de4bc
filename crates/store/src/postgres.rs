//! PostgreSQL-backed store implementation.
//!
//! Overselling is prevented by reading each book row with
//! `SELECT ... FOR UPDATE` inside the checkout transaction: two
//! checkouts contending for the same book serialize on the row lock,
//! and the lock wait is bounded by a per-transaction `lock_timeout` so
//! contention surfaces as a retryable conflict instead of an unbounded
//! block.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, Money, OrderId, OrderStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::records::{Book, HistoryRow, OrderItemRow, OrderRow};
use crate::store::{CheckoutTx, OrderStore};
use crate::{Result, StoreError};

/// Default bound on how long a checkout waits for a contended row lock.
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// PostgreSQL catalog store + order ledger.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store on the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Overrides the bounded lock wait applied to checkout transactions.
    pub fn with_lock_timeout_ms(mut self, lock_timeout_ms: u64) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_book(row: &PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            isbn: row.try_get("isbn")?,
            price: Money::from_cents(row.try_get("price")?),
            publication_year: row.try_get("publication_year")?,
            stock: row.try_get("stock")?,
        })
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::parse(raw)
        .ok_or_else(|| StoreError::CorruptRow(format!("unknown order status {raw:?}")))
}

/// Maps lock timeouts, deadlocks, and serialization failures to
/// [`StoreError::Conflict`]; everything else stays a database error.
fn conflict_or_db(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && matches!(
            db_err.code().as_deref(),
            Some("55P03") | Some("40001") | Some("40P01")
        )
    {
        return StoreError::Conflict(db_err.message().to_string());
    }
    StoreError::Database(err)
}

/// A checkout transaction on a dedicated pooled connection.
pub struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckoutTx {
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, isbn, price, publication_year, stock
            FROM books
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(book_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(conflict_or_db)?;

        row.as_ref().map(PostgresStore::row_to_book).transpose()
    }

    async fn insert_order(&mut self, order: &OrderRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, shipping_address, total_amount, status, order_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(&order.shipping_address)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(order.order_date)
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_db)?;

        Ok(())
    }

    async fn insert_line_item(&mut self, item: &OrderItemRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, book_id, quantity, price_at_time_of_order)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(item.order_id.as_uuid())
        .bind(item.book_id.as_uuid())
        .bind(item.quantity as i32)
        .bind(item.price_at_time_of_order.cents())
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_db)?;

        Ok(())
    }

    async fn decrement_stock(&mut self, book_id: BookId, quantity: u32) -> Result<()> {
        // The row is already held FOR UPDATE; the stock guard is a
        // backstop against a decrement that was never validated.
        let result = sqlx::query(
            r#"
            UPDATE books SET stock = stock - $1
            WHERE id = $2 AND stock >= $1
            "#,
        )
        .bind(i64::from(quantity))
        .bind(book_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(conflict_or_db)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::CorruptRow(format!(
                "unvalidated stock decrement of {quantity} for book {book_id}"
            )));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(conflict_or_db)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(StoreError::Database)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>> {
        let mut tx = self.pool.begin().await.map_err(conflict_or_db)?;

        // SET LOCAL cannot take a bind parameter; the value is a
        // config-controlled integer, not user input.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_db)?;

        Ok(Box::new(PgCheckoutTx { tx }))
    }

    async fn history_rows(&self, customer_id: CustomerId) -> Result<Vec<HistoryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id AS order_id,
                o.order_date,
                o.total_amount,
                o.status,
                b.id AS book_id,
                b.title,
                b.isbn,
                oi.quantity,
                oi.price_at_time_of_order
            FROM orders AS o
            JOIN order_items AS oi ON oi.order_id = o.id
            JOIN books AS b ON b.id = oi.book_id
            WHERE o.customer_id = $1
            ORDER BY o.order_date DESC, o.id, oi.id
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(HistoryRow {
                    order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                    order_date: row.try_get::<DateTime<Utc>, _>("order_date")?,
                    total_amount: Money::from_cents(row.try_get("total_amount")?),
                    status: parse_status(row.try_get::<String, _>("status")?.as_str())?,
                    book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
                    title: row.try_get("title")?,
                    isbn: row.try_get("isbn")?,
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    price_at_time_of_order: Money::from_cents(
                        row.try_get("price_at_time_of_order")?,
                    ),
                })
            })
            .collect()
    }

    async fn insert_book(&self, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, isbn, price, publication_year, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(book.price.cents())
        .bind(book.publication_year)
        .bind(book.stock)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool> {
        let result = sqlx::query("UPDATE books SET price = $1 WHERE id = $2")
            .bind(price.cents())
            .bind(book_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            "SELECT id, title, isbn, price, publication_year, stock FROM books WHERE id = $1",
        )
        .bind(book_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_book).transpose()
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, shipping_address, total_amount, status, order_date
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(OrderRow {
                id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
                customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
                shipping_address: row.try_get("shipping_address")?,
                total_amount: Money::from_cents(row.try_get("total_amount")?),
                status: parse_status(row.try_get::<String, _>("status")?.as_str())?,
                order_date: row.try_get::<DateTime<Utc>, _>("order_date")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, book_id, quantity, price_at_time_of_order
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderItemRow {
                    order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                    book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    price_at_time_of_order: Money::from_cents(
                        row.try_get("price_at_time_of_order")?,
                    ),
                })
            })
            .collect()
    }
}
