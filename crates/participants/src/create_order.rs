//! The `create_order` step: the saga's non-compensatable head.
//!
//! The order row itself is created by `Orchestrator::start` against the
//! Order Record Store before the first execute command is even published
//! (§4.2 "Start"), so this participant has no domain effect of its own — it
//! exists only so the reference sequence has a uniform first hop over the
//! same execute/result protocol every other step uses. Never compensated:
//! `compensate_on_error = false` for this step in `SagaDefinition::reference_sequence`.

use async_trait::async_trait;
use common::SagaPayload;
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Acknowledges the order as created. Stateless: there is nothing to key an
/// idempotency check on because there is no local domain row.
#[derive(Debug, Default)]
pub struct CreateOrderParticipant;

impl CreateOrderParticipant {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ParticipantHandler for CreateOrderParticipant {
    fn step_name(&self) -> &str {
        step_names::CREATE_ORDER
    }

    async fn handle_execute(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        Outcome::Success(payload)
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        // Never invoked in the reference sequence, but a participant must
        // still answer correctly if a replayed compensate command arrives.
        Outcome::Success(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_payload;

    #[tokio::test]
    async fn execute_always_succeeds_and_passes_the_payload_through() {
        let participant = CreateOrderParticipant::new();
        let payload = sample_payload();
        let outcome = participant.handle_execute("saga-1", payload.clone()).await;
        assert!(matches!(outcome, Outcome::Success(p) if p.order_id == payload.order_id));
    }

    #[tokio::test]
    async fn compensate_is_a_trivial_no_op_success() {
        let participant = CreateOrderParticipant::new();
        let payload = sample_payload();
        let outcome = participant.handle_compensate("saga-1", payload).await;
        assert!(matches!(outcome, Outcome::Success(_)));
    }
}
