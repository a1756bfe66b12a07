//! Participant SDK error types.

use thiserror::Error;

/// Errors the participant SDK's runtime can surface.
#[derive(Debug, Error)]
pub enum ParticipantError {
    /// The underlying message bus failed to declare topology, consume, or publish.
    #[error("messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),

    /// An inbound envelope's payload bytes could not be decoded.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for participant SDK operations.
pub type Result<T> = std::result::Result<T, ParticipantError>;
