use store::StoreError;
use thiserror::Error;

/// Errors that can occur while building a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading the committed rows failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
