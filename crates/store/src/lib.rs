//! Data-access layer for the BookNest checkout engine.
//!
//! This crate owns the two durable leaves of the system: the catalog
//! store (books with live price and stock) and the order ledger (order
//! headers and their immutable line items). It exposes them behind the
//! [`OrderStore`] trait, whose [`CheckoutTx`] transaction handle is the
//! locking primitive the checkout coordinator builds on.
//!
//! Two implementations are provided:
//! - [`PostgresStore`] — production backend using row-level `FOR UPDATE`
//!   locks with a bounded `lock_timeout`.
//! - [`InMemoryStore`] — test double that serializes checkouts on a
//!   single asynchronous mutex with a bounded acquisition wait.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{Book, HistoryRow, OrderItemRow, OrderRow};
pub use store::{CheckoutTx, OrderStore};
