use thiserror::Error;

/// Errors that can occur when interacting with the catalog store or
/// order ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction lost a race with a concurrent writer: a lock wait
    /// timed out, a deadlock was broken, or a serialization check failed.
    /// The whole operation is safe to retry.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// A stored row violated an invariant the schema is supposed to
    /// uphold (e.g. an unparseable status or a stock underflow).
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
