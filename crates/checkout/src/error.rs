use common::BookId;
use store::StoreError;
use thiserror::Error;

/// Errors a `place_order` call can return.
///
/// `InvalidCart`, `UnknownBook`, and `InsufficientStock` are business
/// rejections the caller can fix by adjusting the request; `Conflict`
/// means the whole operation may be retried; `Storage` is an infra
/// failure surfaced generically.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart or shipping address was malformed; rejected before any
    /// transaction is opened.
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// A cart line referenced a book that does not exist.
    #[error("Unknown book: {0}")]
    UnknownBook(BookId),

    /// A cart line requested more units than the locked stock allows.
    #[error(
        "Insufficient stock for book {book_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        book_id: BookId,
        requested: u32,
        available: i64,
    },

    /// Lock or commit contention persisted through every retry attempt.
    #[error("Checkout conflicted with concurrent transactions: {0}")]
    Conflict(String),

    /// Non-retryable storage failure.
    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => CheckoutError::Conflict(msg),
            other => CheckoutError::Storage(other),
        }
    }
}

impl CheckoutError {
    /// True if retrying the whole `place_order` call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Conflict(_))
    }
}
