//! The Saga State row: the orchestrator's durable per-saga bookkeeping (§3).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId, UserId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one saga instance.
///
/// Legal transitions form the DAG from spec §3:
/// `Running → Compensating → {Compensated | Failed}` and `Running → Completed`.
/// No other transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStatus {
    Running,
    Compensating,
    Completed,
    Compensated,
    Failed,
}

impl SagaStatus {
    /// Returns true once the saga will never mutate again (the row is then
    /// deleted rather than updated further, per §3 "Once status is terminal
    /// the state is immutable except for the terminal delete that follows").
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed)
    }

    /// Returns true if `to` is a legal transition from `self`.
    pub fn can_transition_to(&self, to: SagaStatus) -> bool {
        use SagaStatus::*;
        matches!(
            (self, to),
            (Running, Compensating)
                | (Running, Completed)
                | (Compensating, Compensated)
                | (Compensating, Failed)
                // idempotent re-entrant transitions to the same status are
                // always allowed; see `HandleResult` duplicate-reply handling.
                | (Running, Running)
                | (Compensating, Compensating)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Running => "Running",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Completed => "Completed",
            SagaStatus::Compensated => "Compensated",
            SagaStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The durable per-saga row owned solely by the orchestrator (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaRecord {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    /// Carried alongside `order_id` so the orchestrator can reconstruct
    /// `order_events` payloads (§6) after a restart, without depending on
    /// the in-flight Saga Payload bytes of whichever message happens to be
    /// redelivered (§9 "Recovery on orchestrator restart").
    pub user_id: UserId,
    pub email: String,
    pub status: SagaStatus,
    pub compensated_steps: HashSet<String>,
    pub total_to_compensate: u32,
    pub last_step: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    /// Creates a brand-new `Running` saga row with empty compensation
    /// bookkeeping, as done by `Orchestrator::start`.
    pub fn new(saga_id: SagaId, order_id: OrderId, user_id: UserId, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            saga_id,
            order_id,
            user_id,
            email: email.into(),
            status: SagaStatus::Running,
            compensated_steps: HashSet::new(),
            total_to_compensate: 0,
            last_step: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the invariant `|compensated_steps| <= total_to_compensate`
    /// once compensation has begun (§3).
    pub fn respects_compensation_bound(&self) -> bool {
        if self.total_to_compensate == 0 {
            return true;
        }
        self.compensated_steps.len() as u32 <= self.total_to_compensate
    }

    /// Checks `status == Compensated ⇔ |compensated_steps| == total_to_compensate
    /// && total_to_compensate > 0, or total_to_compensate == 0 at compensation
    /// start` (§3). Used by tests asserting the engine's terminal invariant.
    pub fn compensation_is_complete(&self) -> bool {
        self.total_to_compensate == 0
            || self.compensated_steps.len() as u32 >= self.total_to_compensate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_from_running() {
        assert!(SagaStatus::Running.can_transition_to(SagaStatus::Completed));
        assert!(SagaStatus::Running.can_transition_to(SagaStatus::Compensating));
        assert!(!SagaStatus::Running.can_transition_to(SagaStatus::Failed));
    }

    #[test]
    fn legal_transitions_from_compensating() {
        assert!(SagaStatus::Compensating.can_transition_to(SagaStatus::Compensated));
        assert!(SagaStatus::Compensating.can_transition_to(SagaStatus::Failed));
        assert!(!SagaStatus::Compensating.can_transition_to(SagaStatus::Completed));
    }

    #[test]
    fn terminal_states_are_completed_compensated_failed() {
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
    }

    #[test]
    fn new_record_starts_running_with_zero_compensation() {
        let now = Utc::now();
        let record = SagaRecord::new(SagaId::new(), OrderId::new(), UserId::new(), "buyer@example.com", now);
        assert_eq!(record.status, SagaStatus::Running);
        assert_eq!(record.total_to_compensate, 0);
        assert!(record.compensated_steps.is_empty());
        assert!(record.compensation_is_complete());
    }

    #[test]
    fn compensation_bound_respected_and_violated() {
        let mut record = SagaRecord::new(SagaId::new(), OrderId::new(), UserId::new(), "buyer@example.com", Utc::now());
        record.total_to_compensate = 2;
        record.compensated_steps.insert("process_billing".into());
        assert!(record.respects_compensation_bound());
        assert!(!record.compensation_is_complete());

        record.compensated_steps.insert("process_payment".into());
        assert!(record.respects_compensation_bound());
        assert!(record.compensation_is_complete());
    }
}
