//! The orchestrator: owns the Saga State, decides transitions, publishes
//! commands (§4.2).

use chrono::Utc;
use common::{SagaId, SagaPayload};
use messaging::routing::ORDER_EVENTS_EXCHANGE;
use messaging::{DEFAULT_PUBLISH_RETRIES, Envelope, MessageBus, Operation, ReplyStatus};
use order_record::{OrderRecordStore, OrderStatus};
use saga_store::{Expected, SagaRecord, SagaStateStore, SagaStatus};

use crate::definition::SagaDefinition;
use crate::error::{Result, SagaError};
use crate::events::{ORDER_CANCELLED_KEY, ORDER_FAILED_KEY, OrderLifecycleEvent};

/// Drives one or more order sagas, generic over the messaging, saga-state,
/// and order-record collaborators, exactly as the teacher's
/// `SagaCoordinator<S, I, P, Sh>` is generic over its event store and
/// domain-service traits.
pub struct Orchestrator<MB, SSS, ORS> {
    definition: SagaDefinition,
    bus: MB,
    store: SSS,
    orders: ORS,
    publish_retries: u32,
}

impl<MB, SSS, ORS> Orchestrator<MB, SSS, ORS>
where
    MB: MessageBus,
    SSS: SagaStateStore,
    ORS: OrderRecordStore,
{
    pub fn new(definition: SagaDefinition, bus: MB, store: SSS, orders: ORS) -> Self {
        Self {
            definition,
            bus,
            store,
            orders,
            publish_retries: DEFAULT_PUBLISH_RETRIES,
        }
    }

    pub fn with_publish_retries(mut self, retries: u32) -> Self {
        self.publish_retries = retries;
        self
    }

    pub fn definition(&self) -> &SagaDefinition {
        &self.definition
    }

    /// `Start(payload)` (§4.2): creates the Saga State row and publishes the
    /// first step's execute command. Publication only happens after durable
    /// state creation, so the order is never left ambiguous on a
    /// persistence failure.
    #[tracing::instrument(skip(self, payload), fields(order_id = %payload.order_id))]
    pub async fn start(&self, payload: SagaPayload) -> Result<SagaId> {
        let first_step = self
            .definition
            .first_step()
            .expect("saga definition must have at least one step")
            .name
            .clone();

        self.orders.create(payload.order_id).await?;

        let saga_id = SagaId::new();
        let now = Utc::now();
        let record = SagaRecord::new(saga_id, payload.order_id, payload.user_id, payload.email.clone(), now);
        self.store.create(record).await?;
        metrics::counter!("saga_started_total").increment(1);

        let data = payload.to_bytes()?;
        let command = Envelope::execute_command(saga_id.to_string(), &first_step, data);
        self.publish(&messaging::routing::execute_key(&first_step), &command).await?;
        metrics::counter!("saga_step_executions_total", "step" => first_step.clone()).increment(1);

        tracing::info!(%saga_id, step = %first_step, "saga started");
        Ok(saga_id)
    }

    /// `HandleResult(envelope)` (§4.2): the core state-transition algorithm.
    /// Returning `Ok(())` means the inbound reply should be acked; returning
    /// `Err` means the caller should nack-and-redeliver. A reply for an
    /// unknown or already-terminal saga is a logged, acked no-op (§7
    /// `UnknownSagaError`), not an error.
    #[tracing::instrument(skip(self, envelope), fields(saga_id = %envelope.saga_id, step = %envelope.step_name))]
    pub async fn handle_result(&self, envelope: Envelope) -> Result<()> {
        let saga_id: SagaId = envelope
            .saga_id
            .parse()
            .map_err(|_| SagaError::Persistence(format!("malformed saga id {}", envelope.saga_id)))?;

        let Some(record) = self.store.load(&saga_id).await? else {
            tracing::warn!(%saga_id, "reply for unknown saga; dropping");
            return Ok(());
        };

        if record.status.is_terminal() {
            tracing::info!(%saga_id, status = %record.status, "reply for saga already terminal; dropping");
            return Ok(());
        }

        match (envelope.operation, envelope.status) {
            (Operation::Compensate, ReplyStatus::Compensated) => {
                self.handle_compensated(record, &envelope.step_name, None).await
            }
            (Operation::Compensate, ReplyStatus::Failed) => {
                // The undo itself could not complete; the engine still marks
                // the step compensated to avoid deadlock (§4.1 reply table,
                // §9 design note preserving this historical behavior).
                self.handle_compensated(record, &envelope.step_name, envelope.error).await
            }
            (Operation::Execute, ReplyStatus::Completed) => {
                self.handle_execute_completed(record, &envelope.step_name, envelope.data).await
            }
            (Operation::Execute, ReplyStatus::Failed) | (Operation::Execute, ReplyStatus::Compensated) => {
                self.handle_execute_failed(record, &envelope.step_name, envelope.error).await
            }
            (operation, status) => {
                tracing::warn!(%saga_id, ?operation, ?status, "unexpected reply encoding; dropping");
                Ok(())
            }
        }
    }

    /// `(compensate, compensated)` and `(compensate, failed)` replies both
    /// land here; `error_reason` is `Some` only for the latter.
    async fn handle_compensated(&self, mut record: SagaRecord, step: &str, error_reason: Option<String>) -> Result<()> {
        let saga_id = record.saga_id;
        if record.compensated_steps.contains(step) {
            tracing::debug!(%saga_id, step, "duplicate compensation ack; no-op");
            return Ok(());
        }

        let expected = Expected::Updated(record.updated_at);
        record.compensated_steps.insert(step.to_string());
        record.last_step = Some(step.to_string());
        if let Some(reason) = error_reason
            && record.error_message.is_none()
        {
            record.error_message = Some(reason);
        }
        record.updated_at = Utc::now();

        if record.total_to_compensate > 0 && record.compensated_steps.len() as u32 >= record.total_to_compensate {
            record.status = SagaStatus::Compensated;
            self.store.update(record.clone(), expected).await?;
            self.finish_compensated(&record).await?;
        } else {
            record.status = SagaStatus::Compensating;
            self.store.update(record, expected).await?;
        }
        Ok(())
    }

    async fn handle_execute_completed(&self, mut record: SagaRecord, step: &str, data: Vec<u8>) -> Result<()> {
        let saga_id = record.saga_id;
        let order_id = record.order_id;

        if record.last_step.as_deref() == Some(step) {
            // Redelivery of a reply we already advanced past: the next
            // step's execute command (or the terminal completion) was
            // already published on the first delivery (§4.2 edge case
            // "orchestrator publishes at most one execute command").
            tracing::debug!(%saga_id, step, "duplicate execute/completed; already advanced past this step");
            return Ok(());
        }

        let expected = Expected::Updated(record.updated_at);

        if self.definition.is_last_step(step) {
            record.status = SagaStatus::Completed;
            record.last_step = Some(step.to_string());
            record.updated_at = Utc::now();
            self.store.update(record, expected).await?;

            self.orders.set_status(order_id, OrderStatus::Completed).await?;
            metrics::counter!("saga_completed_total").increment(1);
            self.store.delete(&saga_id).await?;
            tracing::info!(%saga_id, "saga completed");
            return Ok(());
        }

        let Some(next) = self.definition.next_step(step) else {
            // `is_last_step` already guarded this; unreachable in practice.
            return Ok(());
        };
        let next_name = next.name.clone();

        record.last_step = Some(step.to_string());
        record.updated_at = Utc::now();
        let publish_result = self
            .publish(
                &messaging::routing::execute_key(&next_name),
                &Envelope::execute_command(saga_id.to_string(), &next_name, data),
            )
            .await;

        match publish_result {
            Ok(()) => {
                self.store.update(record, expected).await?;
                metrics::counter!("saga_step_executions_total", "step" => next_name.clone()).increment(1);
                tracing::info!(%saga_id, step = %next_name, "advanced to next step");
                Ok(())
            }
            Err(e) => {
                record.status = SagaStatus::Failed;
                record.error_message = Some(e.to_string());
                self.store.update(record, expected).await?;
                self.orders.set_status(order_id, OrderStatus::Failed).await?;
                metrics::counter!("saga_failed_total").increment(1);
                tracing::error!(%saga_id, error = %e, "publish of next step failed; saga marked failed");
                Ok(())
            }
        }
    }

    async fn handle_execute_failed(&self, mut record: SagaRecord, step: &str, reason: Option<String>) -> Result<()> {
        let saga_id = record.saga_id;
        let order_id = record.order_id;
        let reason = reason.unwrap_or_else(|| "step failed".to_string());

        let expected = Expected::Updated(record.updated_at);
        record.status = SagaStatus::Compensating;
        record.error_message = Some(reason.clone());
        record.updated_at = Utc::now();
        self.store.update(record.clone(), expected).await?;

        self.orders.set_status(order_id, OrderStatus::Failed).await?;
        self.publish_order_event(
            ORDER_FAILED_KEY,
            &OrderLifecycleEvent::failed(record.order_id, record.user_id, record.email.clone(), reason.clone()),
        )
        .await;

        metrics::counter!("saga_failed_total").increment(1);
        tracing::warn!(%saga_id, step, %reason, "step failed; beginning compensation");

        self.fan_out_compensation(record, step).await
    }

    /// Compensation fan-out (§4.2): computes `total_to_compensate` once,
    /// and publishes a compensate command for every not-yet-compensated
    /// predecessor.
    async fn fan_out_compensation(&self, mut record: SagaRecord, failing_step: &str) -> Result<()> {
        let saga_id = record.saga_id;
        let index = self.definition.index_of(failing_step).unwrap_or(self.definition.steps().len());
        let compensatable: Vec<String> = self
            .definition
            .compensatable_predecessors(index)
            .into_iter()
            .map(|s| s.name.clone())
            .collect();

        if record.total_to_compensate == 0 {
            let expected = Expected::Updated(record.updated_at);
            record.total_to_compensate = compensatable.len() as u32;
            record.updated_at = Utc::now();
            self.store.update(record.clone(), expected).await?;
        }

        if compensatable.is_empty() {
            record.status = SagaStatus::Compensated;
            self.store.update(record.clone(), Expected::Updated(record.updated_at)).await?;
            self.finish_compensated_no_predecessors(&record).await?;
            return Ok(());
        }

        // The payload is opaque to the orchestrator; an empty body is
        // acceptable here because every compensatable participant's own
        // domain row is keyed by `order_id`, not by payload contents (§4.3
        // "Participant contract").
        for step in &compensatable {
            if record.compensated_steps.contains(step) {
                continue;
            }
            let command = Envelope::compensate_command(saga_id.to_string(), step, Vec::new());
            if let Err(e) = self.publish(&messaging::routing::compensate_key(step), &command).await {
                tracing::error!(%saga_id, step, error = %e, "failed to publish compensate command");
            }
            metrics::counter!("saga_compensations_total", "step" => step.clone()).increment(1);
        }
        Ok(())
    }

    /// The failing step had no compensatable predecessors (§8 boundary case
    /// "first compensatable step is the one that fails"): `handle_execute_failed`
    /// already set ORS to `Failed` and published `order.failed` before this
    /// was reached, so there is nothing further to tell ORS or notification
    /// about — this is the fan-out's `|C| == 0` branch, which per §4.2 only
    /// marks the saga `Compensated` and deletes its row.
    async fn finish_compensated_no_predecessors(&self, record: &SagaRecord) -> Result<()> {
        let saga_id = record.saga_id;
        metrics::counter!("saga_compensated_total").increment(1);
        self.store.delete(&saga_id).await?;
        tracing::info!(%saga_id, "saga compensated with no compensatable predecessors");
        Ok(())
    }

    async fn finish_compensated(&self, record: &SagaRecord) -> Result<()> {
        let saga_id = record.saga_id;
        self.orders.set_status(record.order_id, OrderStatus::Cancelled).await?;
        let reason = record.error_message.clone().unwrap_or_else(|| "compensated".to_string());
        let event = OrderLifecycleEvent::cancelled(record.order_id, record.user_id, record.email.clone(), reason);
        self.publish_order_event(ORDER_CANCELLED_KEY, &event).await;
        metrics::counter!("saga_compensated_total").increment(1);
        self.store.delete(&saga_id).await?;
        tracing::info!(%saga_id, "saga compensated");
        Ok(())
    }

    async fn publish_order_event(&self, routing_key: &str, event: &OrderLifecycleEvent) {
        let Ok(body) = serde_json::to_vec(event) else {
            return;
        };
        if let Err(e) = self
            .bus
            .publish_with_retry(ORDER_EVENTS_EXCHANGE, routing_key, &body, self.publish_retries)
            .await
        {
            tracing::error!(error = %e, routing_key, "failed to publish order lifecycle event");
        }
    }

    async fn publish(&self, routing_key: &str, envelope: &Envelope) -> std::result::Result<(), messaging::MessagingError> {
        let body = envelope.to_bytes().map_err(messaging::MessagingError::Serialization)?;
        self.bus
            .publish_with_retry(messaging::routing::SAGA_EXCHANGE, routing_key, &body, self.publish_retries)
            .await
    }
}
