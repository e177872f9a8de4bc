//! Shared vocabulary for the BookNest checkout engine.
//!
//! This crate provides the identifier newtypes, the integer-cents money
//! type, and the order status enum used by every other crate in the
//! workspace.

pub mod ids;
pub mod money;
pub mod status;

pub use ids::{BookId, CustomerId, OrderId};
pub use money::Money;
pub use status::OrderStatus;
