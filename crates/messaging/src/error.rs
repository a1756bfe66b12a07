//! Messaging adapter error types.

use thiserror::Error;

/// Errors that can occur when talking to the message bus.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The connection to the broker was lost or could not be established.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// A publish did not succeed after exhausting retries.
    #[error("publish failed after {attempts} attempts: {source}")]
    PublishFailed { attempts: u32, source: String },

    /// A declare (exchange/queue/bind) operation failed.
    #[error("topology declaration failed: {0}")]
    Declare(String),

    /// A consume operation failed to start or was interrupted.
    #[error("consume error: {0}")]
    Consume(String),

    /// The envelope body could not be serialized or deserialized.
    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying AMQP client returned an error.
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}

/// Convenience result alias for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
