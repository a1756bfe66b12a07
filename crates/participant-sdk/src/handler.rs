//! The `ParticipantHandler` trait: the one piece of domain logic a step
//! implements (§4.3 "Participant Base").

use async_trait::async_trait;
use common::SagaPayload;

/// The outcome a handler returns for one inbound command. The runtime turns
/// this into exactly one `Envelope` reply.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The domain effect succeeded (or, for compensate, the undo succeeded
    /// or there was nothing to undo). Carries the payload enriched with the
    /// step's own output, to be republished in the Result.
    Success(SagaPayload),
    /// The domain effect could not be applied (execute) or could not be
    /// undone (compensate). Carries a human-readable reason.
    Failure(String),
}

/// Implemented once per saga step; everything else (queue declaration,
/// decode/encode, exactly-one-reply, ack discipline) lives in
/// [`crate::runtime::ParticipantRuntime`].
///
/// Implementations are responsible for their own idempotency (§4.3
/// "Participant contract"): `handle_execute` keyed by `(saga_id, step)` via a
/// uniqueness constraint on the participant's own domain row, and
/// `handle_compensate` returning `Outcome::Success` when there is nothing to
/// undo.
#[async_trait]
pub trait ParticipantHandler: Send + Sync {
    /// The step name this handler serves, e.g. `"process_billing"`. Used to
    /// derive queue and routing-key names.
    fn step_name(&self) -> &str;

    /// Applies the domain effect for this step.
    async fn handle_execute(&self, saga_id: &str, payload: SagaPayload) -> Outcome;

    /// Undoes the domain effect for this step, if any was applied.
    async fn handle_compensate(&self, saga_id: &str, payload: SagaPayload) -> Outcome;
}
