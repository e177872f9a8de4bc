//! Read-side projections for the BookNest checkout engine.
//!
//! The only projection in scope folds the flat orders ⋈ order_items ⋈
//! books join back into nested per-order summaries for presentation.
//! It is read-only and lock-free: it sees nothing but already-committed
//! rows.

pub mod error;
pub mod history;

pub use error::{ProjectionError, Result};
pub use history::{OrderHistoryProjector, OrderItemSummary, OrderSummary, fold_history};
