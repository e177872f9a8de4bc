//! Order status enum.

use serde::{Deserialize, Serialize};

/// The status of a placed order.
///
/// Every order starts `Pending`; later transitions (shipping, delivery)
/// are driven by fulfillment, outside the checkout core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed and stock reserved.
    #[default]
    Pending,

    /// Order has been handed to the carrier.
    Shipped,

    /// Order has been delivered (terminal state).
    Delivered,
}

impl OrderStatus {
    /// Returns the status name as stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
        }
    }

    /// Parses a status from its ledger representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Shipped" => Some(OrderStatus::Shipped),
            "Delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
