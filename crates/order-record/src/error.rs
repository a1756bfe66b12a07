//! Order Record Store error types.

use common::OrderId;
use thiserror::Error;

/// Errors that can occur when reading or writing the Order Record Store.
#[derive(Debug, Error)]
pub enum OrderRecordError {
    /// No order row exists for the given id.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The requested status transition would overwrite a terminal status
    /// with a non-terminal one; rejected per §5 "monotonic status transitions".
    #[error("order {order_id} is already terminal at {current}; refusing to move to {attempted}")]
    NonMonotonicTransition {
        order_id: OrderId,
        current: &'static str,
        attempted: &'static str,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Convenience result alias for Order Record Store operations.
pub type Result<T> = std::result::Result<T, OrderRecordError>;
