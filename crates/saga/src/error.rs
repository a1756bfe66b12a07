//! Orchestrator error types (§7).

use common::SagaId;
use thiserror::Error;

/// Errors the orchestrator can surface. Transient broker errors are
/// recovered locally by the messaging adapter's retry (§4.4) and only
/// surface here once retries are exhausted.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The Saga State or Order Record Store could not be written. On
    /// `Start`, propagated to the caller (the saga is not started). On
    /// `HandleResult`, causes the reply to be nacked for redelivery (§7).
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A message could not be published after exhausting retries.
    #[error("messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),

    /// The payload bytes on an envelope could not be decoded.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reply referenced a saga id absent from the Saga State Store.
    /// Logged at WARN and acked by the caller, not treated as a failure
    /// of the engine (§7 `UnknownSagaError`).
    #[error("unknown saga: {0}")]
    UnknownSaga(SagaId),
}

impl From<saga_store::StoreError> for SagaError {
    fn from(err: saga_store::StoreError) -> Self {
        SagaError::Persistence(err.to_string())
    }
}

impl From<order_record::OrderRecordError> for SagaError {
    fn from(err: order_record::OrderRecordError) -> Self {
        SagaError::Persistence(err.to_string())
    }
}

/// Convenience result alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, SagaError>;
