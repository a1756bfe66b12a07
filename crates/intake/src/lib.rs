//! Order Intake: the in-process entry point that assembles the initial
//! Saga Payload and invokes the orchestrator's `Start` operation (§2, §6
//! "Intake entry point").
//!
//! Intake itself owns no domain state; it is a thin adapter in front of
//! [`saga::Orchestrator::start`], exactly as spec §2 describes it: "creates
//! the order row, assembles initial saga payload, and invokes the
//! orchestrator's Start entry point." Order-row creation is delegated to
//! `Orchestrator::start` itself (§4.2), which writes the Order Record Store
//! before any message is published.

use common::{DeliveryRequest, Money, OrderId, OrderItem, SagaId, SagaPayload, UserId};
use messaging::MessageBus;
use order_record::OrderRecordStore;
use saga::{Orchestrator, SagaError};
use saga_store::SagaStateStore;

/// The fields an upstream HTTP handler (out of scope per spec §1) gathers
/// before calling [`start_order_saga`]. Mirrors the shape of
/// `SagaPayload::new`'s constructor arguments one-for-one; kept as a
/// separate type so callers don't need to know about `SagaPayload`'s
/// participant-output fields, which only participants ever populate.
#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub amount: Money,
    pub delivery: Option<DeliveryRequest>,
}

impl NewOrderRequest {
    fn into_payload(self) -> SagaPayload {
        SagaPayload::new(self.order_id, self.user_id, self.email, self.items, self.amount, self.delivery)
    }
}

/// `StartOrderSaga(ctx, payload) -> error` (§6). Assembles the initial
/// payload and delegates to the orchestrator; propagates
/// [`SagaError::Persistence`] unchanged so the caller knows the order was
/// never started (§4.2 "Start" — publication only happens after durable
/// state creation, so there is no ambiguous partial-start state to report).
#[tracing::instrument(skip(orchestrator, request), fields(order_id = %request.order_id))]
pub async fn start_order_saga<MB, SSS, ORS>(
    orchestrator: &Orchestrator<MB, SSS, ORS>,
    request: NewOrderRequest,
) -> Result<SagaId, SagaError>
where
    MB: MessageBus,
    SSS: SagaStateStore,
    ORS: OrderRecordStore,
{
    let payload = request.into_payload();
    orchestrator.start(payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_record::{InMemoryOrderRecordStore, OrderStatus};
    use saga::SagaDefinition;
    use saga_store::InMemorySagaStateStore;

    fn sample_request() -> NewOrderRequest {
        NewOrderRequest {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            email: "buyer@example.com".to_string(),
            items: vec![OrderItem {
                product_id: "SKU-1".into(),
                quantity: 1,
                price: Money::from_cents(1000),
            }],
            amount: Money::from_cents(1000),
            delivery: None,
        }
    }

    #[tokio::test]
    async fn start_order_saga_creates_the_order_row_and_publishes_the_first_step() {
        let bus = messaging::InMemoryMessageBus::new();
        let store = InMemorySagaStateStore::new();
        let orders = InMemoryOrderRecordStore::new();
        let orchestrator = Orchestrator::new(SagaDefinition::reference_sequence(), bus.clone(), store.clone(), orders.clone());

        bus.declare_topology().await.unwrap();
        let queue = messaging::routing::execute_queue(saga::step_names::CREATE_ORDER);
        bus.declare_queue(&queue).await.unwrap();
        bus.bind_queue(&queue, messaging::routing::SAGA_EXCHANGE, &messaging::routing::execute_key(saga::step_names::CREATE_ORDER))
            .await
            .unwrap();

        let request = sample_request();
        let order_id = request.order_id;
        let saga_id = start_order_saga(&orchestrator, request).await.unwrap();

        assert_eq!(orders.status(order_id).await.unwrap(), Some(OrderStatus::Pending));
        assert!(store.load(&saga_id).await.unwrap().is_some());

        use futures_util::StreamExt;
        let mut stream = bus.consume(&queue).await.unwrap();
        let delivery = stream.next().await.unwrap();
        let envelope = messaging::Envelope::from_bytes(delivery.body()).unwrap();
        assert_eq!(envelope.saga_id, saga_id.to_string());
        assert_eq!(envelope.step_name, saga::step_names::CREATE_ORDER);
    }
}
