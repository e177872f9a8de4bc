//! Row types shared by the store backends.

use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, Money, OrderId, OrderStatus};

/// A catalog book row.
///
/// `price` is the current, mutable unit price; `stock` is the quantity
/// available for sale and is never negative outside an in-flight
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub isbn: String,
    pub price: Money,
    pub publication_year: i32,
    pub stock: i64,
}

/// An order header row. Immutable after creation except for `status`
/// transitions, which are out of scope for the checkout core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub shipping_address: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

/// An order line item row. Created together with its order and never
/// mutated; `price_at_time_of_order` is the permanent price snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRow {
    pub order_id: OrderId,
    pub book_id: BookId,
    pub quantity: u32,
    pub price_at_time_of_order: Money,
}

/// One row of the denormalized orders ⋈ order_items ⋈ books join used
/// by the order history projector. Rows arrive most recent order first,
/// with a stable intra-order item order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub book_id: BookId,
    pub title: String,
    pub isbn: String,
    pub quantity: u32,
    pub price_at_time_of_order: Money,
}
