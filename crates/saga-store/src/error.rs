//! Saga State Store error types.

use common::SagaId;
use thiserror::Error;

/// Errors that can occur when reading or writing the Saga State Store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row already exists for this saga id (`create` is not an upsert).
    #[error("saga {0} already exists")]
    AlreadyExists(SagaId),

    /// Optimistic-concurrency check failed: another writer updated the row
    /// between this caller's read and write. Safe to retry the read-modify-write.
    #[error("concurrent update detected for saga {0}; retry the read-modify-write")]
    ConcurrencyConflict(SagaId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
