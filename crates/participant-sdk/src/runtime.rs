//! The shared participant consumer (§4.3 "Participant Base"): declares both
//! of a step's queues, dispatches inbound commands to a [`ParticipantHandler`],
//! and publishes exactly one reply per inbound message.

use std::sync::Arc;

use common::SagaPayload;
use futures_util::StreamExt;
use messaging::{Envelope, MessageBus, MessageDelivery, Operation};

use crate::error::Result;
use crate::handler::{Outcome, ParticipantHandler};

/// Drives one participant step's two queues to completion. Generic over the
/// handler and the message bus, mirroring the orchestrator's own
/// collaborator-generic shape.
pub struct ParticipantRuntime<H, MB> {
    handler: Arc<H>,
    bus: Arc<MB>,
    publish_retries: u32,
}

impl<H, MB> ParticipantRuntime<H, MB>
where
    H: ParticipantHandler + 'static,
    MB: MessageBus + 'static,
{
    pub fn new(handler: H, bus: MB) -> Self {
        Self {
            handler: Arc::new(handler),
            bus: Arc::new(bus),
            publish_retries: messaging::DEFAULT_PUBLISH_RETRIES,
        }
    }

    pub fn with_publish_retries(mut self, retries: u32) -> Self {
        self.publish_retries = retries;
        self
    }

    /// Declares this step's execute/compensate queues, bound to the shared
    /// saga exchange (§4.3).
    pub async fn declare_topology(&self) -> Result<()> {
        let step = self.handler.step_name();
        self.bus.declare_topology().await?;

        let execute_queue = messaging::routing::execute_queue(step);
        self.bus.declare_queue(&execute_queue).await?;
        self.bus
            .bind_queue(&execute_queue, messaging::routing::SAGA_EXCHANGE, &messaging::routing::execute_key(step))
            .await?;

        let compensate_queue = messaging::routing::compensate_queue(step);
        self.bus.declare_queue(&compensate_queue).await?;
        self.bus
            .bind_queue(
                &compensate_queue,
                messaging::routing::SAGA_EXCHANGE,
                &messaging::routing::compensate_key(step),
            )
            .await?;
        Ok(())
    }

    /// Runs both consumer loops concurrently until either stream ends (the
    /// bus is dropped) or an unrecoverable consume error occurs. Intended to
    /// be spawned as one task per step by the engine binary.
    pub async fn run(&self) -> Result<()> {
        let step = self.handler.step_name();
        let execute_queue = messaging::routing::execute_queue(step);
        let compensate_queue = messaging::routing::compensate_queue(step);

        let execute_stream = self.bus.consume(&execute_queue).await?;
        let compensate_stream = self.bus.consume(&compensate_queue).await?;

        let execute_loop = self.consume_loop(execute_stream, Operation::Execute);
        let compensate_loop = self.consume_loop(compensate_stream, Operation::Compensate);

        tokio::try_join!(execute_loop, compensate_loop)?;
        Ok(())
    }

    async fn consume_loop(
        &self,
        mut stream: messaging::DeliveryStream<MB::Delivery>,
        operation: Operation,
    ) -> Result<()> {
        let step = self.handler.step_name();
        while let Some(delivery) = stream.next().await {
            let body = delivery.body().to_vec();
            match Envelope::from_bytes(&body) {
                Ok(command) => {
                    self.dispatch(&command, operation).await?;
                    delivery.ack().await?;
                }
                Err(e) => {
                    tracing::error!(step, error = %e, "failed to decode inbound command; nacking without requeue");
                    delivery.nack(false).await?;
                }
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, command), fields(saga_id = %command.saga_id, step = %command.step_name))]
    async fn dispatch(&self, command: &Envelope, operation: Operation) -> Result<()> {
        let step = self.handler.step_name();
        let payload = SagaPayload::from_bytes(&command.data)?;
        let saga_id = command.saga_id.as_str();

        let outcome = match operation {
            Operation::Execute => self.handler.handle_execute(saga_id, payload).await,
            Operation::Compensate => self.handler.handle_compensate(saga_id, payload).await,
        };

        let reply = match (operation, outcome) {
            (Operation::Execute, Outcome::Success(payload)) => {
                metrics::counter!("participant_execute_completed_total", "step" => step.to_string()).increment(1);
                Envelope::execute_completed(saga_id, step, payload.to_bytes()?)
            }
            (Operation::Execute, Outcome::Failure(reason)) => {
                metrics::counter!("participant_execute_failed_total", "step" => step.to_string()).increment(1);
                Envelope::execute_failed(saga_id, step, command.data.clone(), reason)
            }
            (Operation::Compensate, Outcome::Success(payload)) => {
                metrics::counter!("participant_compensated_total", "step" => step.to_string()).increment(1);
                Envelope::compensated(saga_id, step, payload.to_bytes()?)
            }
            (Operation::Compensate, Outcome::Failure(reason)) => {
                metrics::counter!("participant_compensate_failed_total", "step" => step.to_string()).increment(1);
                Envelope::compensate_failed(saga_id, step, command.data.clone(), reason)
            }
        };

        self.publish_reply(step, &reply).await
    }

    async fn publish_reply(&self, step: &str, reply: &Envelope) -> Result<()> {
        let body = reply.to_bytes()?;
        self.bus
            .publish_with_retry(
                messaging::routing::SAGA_EXCHANGE,
                &messaging::routing::result_key(step),
                &body,
                self.publish_retries,
            )
            .await?;
        Ok(())
    }
}
