//! Store error types.

use ratewatch_common::RatewatchError;
use thiserror::Error;

/// Errors raised by a [`crate::RateStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// The database rejected or failed an operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A schema migration could not be applied.
    #[error("Migration {version} failed: {source}")]
    Migration {
        version: i32,
        #[source]
        source: sqlx::Error,
    },

    /// A stored value could not be decoded into a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A write transaction was used after it finished.
    #[error("Transaction already finished")]
    TransactionClosed,
}

impl StoreError {
    /// Map a sqlx error, turning unique violations into [`StoreError::Conflict`].
    pub(crate) fn from_write(err: sqlx::Error, conflict: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(conflict()),
            _ => StoreError::Database(err),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for RatewatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => RatewatchError::Conflict(message),
            other => RatewatchError::DatabaseError(other.to_string()),
        }
    }
}
