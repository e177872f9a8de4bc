//! Order history read model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{BookId, CustomerId, Money, OrderId, OrderStatus};
use serde::Serialize;
use store::{HistoryRow, OrderStore};

use crate::Result;

/// One line item of a historical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemSummary {
    pub book_id: BookId,
    pub title: String,
    pub isbn: String,
    pub quantity: u32,
    pub price_at_order_time: Money,
}

/// A past order with its header fields and ordered line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub items: Vec<OrderItemSummary>,
}

/// Folds the flat join rows into one summary per distinct order id.
///
/// A pure, allocation-only transform: output order is the first-seen
/// order of each order id (the rows arrive most recent order first),
/// and items keep their relative read order within an order. Running
/// it twice on the same rows yields identical output.
pub fn fold_history(rows: &[HistoryRow]) -> Vec<OrderSummary> {
    let mut summaries: Vec<OrderSummary> = Vec::new();
    let mut index: HashMap<OrderId, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.order_id).or_insert_with(|| {
            summaries.push(OrderSummary {
                order_id: row.order_id,
                order_date: row.order_date,
                total_amount: row.total_amount,
                status: row.status,
                items: Vec::new(),
            });
            summaries.len() - 1
        });
        summaries[slot].items.push(OrderItemSummary {
            book_id: row.book_id,
            title: row.title.clone(),
            isbn: row.isbn.clone(),
            quantity: row.quantity,
            price_at_order_time: row.price_at_time_of_order,
        });
    }

    summaries
}

/// Reads a customer's committed order rows and folds them into nested
/// summaries, most recent order first.
pub struct OrderHistoryProjector<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderHistoryProjector<S> {
    /// Creates a projector over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the customer's order history as nested summaries.
    #[tracing::instrument(skip(self))]
    pub async fn order_history(&self, customer_id: CustomerId) -> Result<Vec<OrderSummary>> {
        let rows = self.store.history_rows(customer_id).await?;
        metrics::counter!("history_reads_total").increment(1);
        Ok(fold_history(&rows))
    }
}
