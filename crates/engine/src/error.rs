//! Engine-level error type: the union of every collaborator's error this
//! process can surface while wiring consumer loops at startup (§7).

use thiserror::Error;

/// Errors the engine process can surface while starting up or running its
/// consumer loops. Individual saga outcomes are never reported through this
/// type — they are observable only via the order's terminal status and the
/// auxiliary order events (§7 "Propagation policy").
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),

    #[error("saga error: {0}")]
    Saga(#[from] saga::SagaError),

    #[error("participant error: {0}")]
    Participant(#[from] participant_sdk::ParticipantError),

    #[error("saga state store error: {0}")]
    SagaStore(#[from] saga_store::StoreError),

    #[error("order record store error: {0}")]
    OrderRecord(#[from] order_record::OrderRecordError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("http server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
