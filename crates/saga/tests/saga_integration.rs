//! Integration tests for the orchestrator, driven directly against
//! `Envelope` replies the way a participant would publish them, against the
//! in-memory collaborators (spec §8 seed scenarios).

use common::{Money, OrderItem, SagaPayload, UserId};
use messaging::{Envelope, MessageBus};
use order_record::{InMemoryOrderRecordStore, OrderRecordStore, OrderStatus};
use saga::{Orchestrator, SagaDefinition, step_names};
use saga_store::{InMemorySagaStateStore, SagaStateStore, SagaStatus};

type TestOrchestrator = Orchestrator<messaging::InMemoryMessageBus, InMemorySagaStateStore, InMemoryOrderRecordStore>;

struct Harness {
    orchestrator: TestOrchestrator,
    bus: messaging::InMemoryMessageBus,
    store: InMemorySagaStateStore,
    orders: InMemoryOrderRecordStore,
}

impl Harness {
    fn new() -> Self {
        let bus = messaging::InMemoryMessageBus::new();
        let store = InMemorySagaStateStore::new();
        let orders = InMemoryOrderRecordStore::new();
        let orchestrator = Orchestrator::new(
            SagaDefinition::reference_sequence(),
            bus.clone(),
            store.clone(),
            orders.clone(),
        );
        Self {
            orchestrator,
            bus,
            store,
            orders,
        }
    }

    fn payload() -> SagaPayload {
        SagaPayload::new(
            common::OrderId::new(),
            UserId::new(),
            "buyer@example.com",
            vec![OrderItem {
                product_id: "SKU-1".into(),
                quantity: 2,
                price: Money::from_cents(500),
            }],
            Money::from_cents(1000),
            None,
        )
    }

}

/// Binds one queue per execute/compensate routing key so a test can observe
/// every command the orchestrator publishes.
async fn bind_step_queues(bus: &messaging::InMemoryMessageBus, steps: &[&str]) {
    bus.declare_topology().await.unwrap();
    for step in steps {
        let execute_queue = format!("{step}_execute_test");
        bus.declare_queue(&execute_queue).await.unwrap();
        bus.bind_queue(&execute_queue, messaging::routing::SAGA_EXCHANGE, &messaging::routing::execute_key(step))
            .await
            .unwrap();

        let compensate_queue = format!("{step}_compensate_test");
        bus.declare_queue(&compensate_queue).await.unwrap();
        bus.bind_queue(
            &compensate_queue,
            messaging::routing::SAGA_EXCHANGE,
            &messaging::routing::compensate_key(step),
        )
        .await
        .unwrap();
    }
}

async fn next_execute(bus: &messaging::InMemoryMessageBus, step: &str) -> Envelope {
    use futures_util::StreamExt;
    let mut stream = bus.consume(&format!("{step}_execute_test")).await.unwrap();
    let delivery = stream.next().await.expect("expected an execute command");
    let envelope = Envelope::from_bytes(delivery.body()).unwrap();
    delivery.ack().await.unwrap();
    envelope
}

async fn next_compensate(bus: &messaging::InMemoryMessageBus, step: &str) -> Envelope {
    use futures_util::StreamExt;
    let mut stream = bus.consume(&format!("{step}_compensate_test")).await.unwrap();
    let delivery = stream.next().await.expect("expected a compensate command");
    let envelope = Envelope::from_bytes(delivery.body()).unwrap();
    delivery.ack().await.unwrap();
    envelope
}

const ALL_STEPS: &[&str] = &[
    step_names::CREATE_ORDER,
    step_names::PROCESS_BILLING,
    step_names::PROCESS_PAYMENT,
    step_names::RESERVE_WAREHOUSE,
    step_names::SCHEDULE_DELIVERY,
    step_names::NOTIFY_CUSTOMER,
];

#[tokio::test]
async fn happy_path_completes_all_six_steps() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let order_id = payload.order_id;
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    for (i, step) in ALL_STEPS.iter().enumerate() {
        let command = next_execute(&h.bus, step).await;
        assert_eq!(command.saga_id, saga_id.to_string());
        let reply = Envelope::execute_completed(saga_id.to_string(), *step, payload.to_bytes().unwrap());
        h.orchestrator.handle_result(reply).await.unwrap();

        if i + 1 < ALL_STEPS.len() {
            assert!(h.store.load(&saga_id).await.unwrap().is_some());
        }
    }

    assert!(h.store.load(&saga_id).await.unwrap().is_none());
    assert_eq!(h.orders.status(order_id).await.unwrap(), Some(OrderStatus::Completed));
}

#[tokio::test]
async fn billing_failure_triggers_no_compensation_since_billing_is_the_first_compensatable_step() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let order_id = payload.order_id;
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    let _create_order_cmd = next_execute(&h.bus, step_names::CREATE_ORDER).await;
    h.orchestrator
        .handle_result(Envelope::execute_completed(
            saga_id.to_string(),
            step_names::CREATE_ORDER,
            payload.to_bytes().unwrap(),
        ))
        .await
        .unwrap();

    let _billing_cmd = next_execute(&h.bus, step_names::PROCESS_BILLING).await;
    h.orchestrator
        .handle_result(Envelope::execute_failed(
            saga_id.to_string(),
            step_names::PROCESS_BILLING,
            vec![],
            "insufficient funds",
        ))
        .await
        .unwrap();

    // Billing has no compensatable predecessors, so there is nothing to fan
    // out: the saga resolves straight to `Compensated` and its row is
    // deleted on the same pass. ORS stays at the `Failed` status set when
    // the step failed (§8 scenario 2: "ORS status Failed … exactly one
    // order.failed event") — the empty fan-out must not overwrite it with
    // `Cancelled` or publish a second lifecycle event.
    assert!(h.store.load(&saga_id).await.unwrap().is_none());
    assert_eq!(h.orders.status(order_id).await.unwrap(), Some(OrderStatus::Failed));
}

#[tokio::test]
async fn warehouse_failure_compensates_billing_and_payment() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let order_id = payload.order_id;
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    for step in [step_names::CREATE_ORDER, step_names::PROCESS_BILLING, step_names::PROCESS_PAYMENT] {
        let _ = next_execute(&h.bus, step).await;
        h.orchestrator
            .handle_result(Envelope::execute_completed(saga_id.to_string(), step, payload.to_bytes().unwrap()))
            .await
            .unwrap();
    }

    let _warehouse_cmd = next_execute(&h.bus, step_names::RESERVE_WAREHOUSE).await;
    h.orchestrator
        .handle_result(Envelope::execute_failed(
            saga_id.to_string(),
            step_names::RESERVE_WAREHOUSE,
            vec![],
            "out of stock",
        ))
        .await
        .unwrap();

    let record = h.store.load(&saga_id).await.unwrap().unwrap();
    assert_eq!(record.total_to_compensate, 2);
    assert_eq!(record.status, SagaStatus::Compensating);

    let payment_compensate = next_compensate(&h.bus, step_names::PROCESS_PAYMENT).await;
    assert_eq!(payment_compensate.saga_id, saga_id.to_string());
    let billing_compensate = next_compensate(&h.bus, step_names::PROCESS_BILLING).await;
    assert_eq!(billing_compensate.saga_id, saga_id.to_string());

    h.orchestrator
        .handle_result(Envelope::compensated(saga_id.to_string(), step_names::PROCESS_PAYMENT, vec![]))
        .await
        .unwrap();
    assert!(h.store.load(&saga_id).await.unwrap().is_some());

    h.orchestrator
        .handle_result(Envelope::compensated(saga_id.to_string(), step_names::PROCESS_BILLING, vec![]))
        .await
        .unwrap();

    assert!(h.store.load(&saga_id).await.unwrap().is_none());
    assert_eq!(h.orders.status(order_id).await.unwrap(), Some(OrderStatus::Cancelled));
}

#[tokio::test]
async fn delivery_failure_compensates_three_predecessors() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    for step in [
        step_names::CREATE_ORDER,
        step_names::PROCESS_BILLING,
        step_names::PROCESS_PAYMENT,
        step_names::RESERVE_WAREHOUSE,
    ] {
        let _ = next_execute(&h.bus, step).await;
        h.orchestrator
            .handle_result(Envelope::execute_completed(saga_id.to_string(), step, payload.to_bytes().unwrap()))
            .await
            .unwrap();
    }

    let _delivery_cmd = next_execute(&h.bus, step_names::SCHEDULE_DELIVERY).await;
    h.orchestrator
        .handle_result(Envelope::execute_failed(
            saga_id.to_string(),
            step_names::SCHEDULE_DELIVERY,
            vec![],
            "no courier available",
        ))
        .await
        .unwrap();

    let record = h.store.load(&saga_id).await.unwrap().unwrap();
    assert_eq!(record.total_to_compensate, 3);

    for step in [step_names::RESERVE_WAREHOUSE, step_names::PROCESS_PAYMENT, step_names::PROCESS_BILLING] {
        let _ = next_compensate(&h.bus, step).await;
        h.orchestrator
            .handle_result(Envelope::compensated(saga_id.to_string(), step, vec![]))
            .await
            .unwrap();
    }

    assert!(h.store.load(&saga_id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_execute_completed_does_not_publish_the_next_step_twice() {
    use futures_util::StreamExt;

    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    // The in-memory bus allows only one consumer per queue at a time
    // (`InMemoryMessageBus::consume` takes its mpsc receiver and never gives
    // it back), so both the first command and a would-be duplicate must be
    // observed through the same open stream rather than calling `consume`
    // again.
    let mut billing_stream = h.bus.consume(&format!("{}_execute_test", step_names::PROCESS_BILLING)).await.unwrap();

    let _ = next_execute(&h.bus, step_names::CREATE_ORDER).await;
    let reply = Envelope::execute_completed(saga_id.to_string(), step_names::CREATE_ORDER, payload.to_bytes().unwrap());
    h.orchestrator.handle_result(reply.clone()).await.unwrap();

    let first = billing_stream.next().await.expect("expected the process_billing execute command");
    Envelope::from_bytes(first.body()).unwrap();
    first.ack().await.unwrap();

    // Redelivery of the same reply: the orchestrator's `last_step` guard
    // recognizes it already advanced past `create_order` and must not
    // republish `saga.process_billing.execute` a second time.
    h.orchestrator.handle_result(reply).await.unwrap();

    // A bounded wait: if a second command was published it would already be
    // queued by now since publish is synchronous in the in-memory bus.
    let mut redelivered = false;
    tokio::select! {
        delivery = billing_stream.next() => {
            if delivery.is_some() {
                redelivered = true;
            }
        }
        _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
    }
    assert!(!redelivered, "duplicate reply must not publish a second next-step command");
}

#[tokio::test]
async fn reply_for_unknown_saga_is_dropped_without_error() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let unknown = common::SagaId::new();
    let reply = Envelope::execute_completed(unknown.to_string(), step_names::CREATE_ORDER, vec![]);
    h.orchestrator.handle_result(reply).await.unwrap();
    assert!(h.store.load(&unknown).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_compensation_ack_is_a_noop() {
    let h = Harness::new();
    bind_step_queues(&h.bus, ALL_STEPS).await;

    let payload = Harness::payload();
    let saga_id = h.orchestrator.start(payload.clone()).await.unwrap();

    for step in [step_names::CREATE_ORDER, step_names::PROCESS_BILLING, step_names::PROCESS_PAYMENT] {
        let _ = next_execute(&h.bus, step).await;
        h.orchestrator
            .handle_result(Envelope::execute_completed(saga_id.to_string(), step, payload.to_bytes().unwrap()))
            .await
            .unwrap();
    }
    let _ = next_execute(&h.bus, step_names::RESERVE_WAREHOUSE).await;
    h.orchestrator
        .handle_result(Envelope::execute_failed(
            saga_id.to_string(),
            step_names::RESERVE_WAREHOUSE,
            vec![],
            "out of stock",
        ))
        .await
        .unwrap();

    let _ = next_compensate(&h.bus, step_names::PROCESS_PAYMENT).await;
    let _ = next_compensate(&h.bus, step_names::PROCESS_BILLING).await;

    let ack = Envelope::compensated(saga_id.to_string(), step_names::PROCESS_PAYMENT, vec![]);
    h.orchestrator.handle_result(ack.clone()).await.unwrap();
    let before = h.store.load(&saga_id).await.unwrap().unwrap();

    h.orchestrator.handle_result(ack).await.unwrap();
    let after = h.store.load(&saga_id).await.unwrap().unwrap();
    assert_eq!(before.compensated_steps, after.compensated_steps);
    assert_eq!(before.updated_at, after.updated_at);
}
