//! Order transaction coordinator.
//!
//! Given a resolved customer identity and a validated cart, the
//! coordinator executes the atomic checkout protocol against the
//! catalog store and order ledger: every line's stock and price are
//! read under a row lock inside one transaction, the order header and
//! line items are written with price snapshots, stock is decremented,
//! and the whole sequence has exactly one terminal outcome — commit or
//! rollback. Transient lock contention is retried whole-operation, a
//! bounded number of times.

pub mod cart;
pub mod coordinator;
pub mod error;

pub use cart::{Cart, CartLine};
pub use coordinator::{CheckoutCoordinator, PlacedOrder};
pub use error::CheckoutError;
