//! Cart input types and validation.

use common::BookId;

use crate::error::CheckoutError;

/// One requested line: a book and a quantity.
///
/// Duplicate book ids across lines are deliberately not merged — each
/// line is validated and recorded independently, matching the caller's
/// line-by-line intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub book_id: BookId,
    pub quantity: u32,
}

/// A validated, non-empty sequence of cart lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Validates the raw lines into a cart.
    ///
    /// Rejects an empty cart and any line with a zero quantity; these
    /// checks run before a transaction is ever opened.
    pub fn new(lines: Vec<CartLine>) -> Result<Self, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::InvalidCart("cart is empty".to_string()));
        }
        for line in &lines {
            if line.quantity == 0 {
                return Err(CheckoutError::InvalidCart(format!(
                    "quantity for book {} must be at least 1",
                    line.book_id
                )));
            }
        }
        Ok(Self { lines })
    }

    /// The validated lines, in request order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }
}
