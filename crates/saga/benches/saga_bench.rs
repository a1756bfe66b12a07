use common::{Money, OrderItem, SagaPayload, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use messaging::{Envelope, InMemoryMessageBus, MessageBus};
use order_record::InMemoryOrderRecordStore;
use saga::{Orchestrator, SagaDefinition, step_names};
use saga_store::InMemorySagaStateStore;

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

fn bench_start(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga/start", |b| {
        b.iter(|| {
            rt.block_on(async {
                let orchestrator = Orchestrator::new(
                    SagaDefinition::reference_sequence(),
                    InMemoryMessageBus::new(),
                    InMemorySagaStateStore::new(),
                    InMemoryOrderRecordStore::new(),
                );
                orchestrator.start(payload()).await.unwrap();
            });
        });
    });
}

fn bench_happy_path_six_steps(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let steps = [
        step_names::CREATE_ORDER,
        step_names::PROCESS_BILLING,
        step_names::PROCESS_PAYMENT,
        step_names::RESERVE_WAREHOUSE,
        step_names::SCHEDULE_DELIVERY,
        step_names::NOTIFY_CUSTOMER,
    ];

    c.bench_function("saga/happy_path_six_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryMessageBus::new();
                bus.declare_topology().await.unwrap();
                let orchestrator = Orchestrator::new(
                    SagaDefinition::reference_sequence(),
                    bus,
                    InMemorySagaStateStore::new(),
                    InMemoryOrderRecordStore::new(),
                );
                let payload = payload();
                let saga_id = orchestrator.start(payload.clone()).await.unwrap();
                for step in steps {
                    let reply = Envelope::execute_completed(saga_id.to_string(), step, payload.to_bytes().unwrap());
                    orchestrator.handle_result(reply).await.unwrap();
                }
            });
        });
    });
}

/// Compensation fan-out is the hot path called out by spec §2's line-budget
/// split ("correct accounting of how many compensations are outstanding");
/// this benchmarks the worst case in the reference sequence, a
/// `schedule_delivery` failure fanning out to all three compensatable
/// predecessors.
fn bench_compensation_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let prelude = [
        step_names::CREATE_ORDER,
        step_names::PROCESS_BILLING,
        step_names::PROCESS_PAYMENT,
        step_names::RESERVE_WAREHOUSE,
    ];
    let compensations = [step_names::RESERVE_WAREHOUSE, step_names::PROCESS_PAYMENT, step_names::PROCESS_BILLING];

    c.bench_function("saga/compensation_fan_out", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = InMemoryMessageBus::new();
                bus.declare_topology().await.unwrap();
                let orchestrator = Orchestrator::new(
                    SagaDefinition::reference_sequence(),
                    bus,
                    InMemorySagaStateStore::new(),
                    InMemoryOrderRecordStore::new(),
                );
                let payload = payload();
                let saga_id = orchestrator.start(payload.clone()).await.unwrap();
                for step in prelude {
                    let reply = Envelope::execute_completed(saga_id.to_string(), step, payload.to_bytes().unwrap());
                    orchestrator.handle_result(reply).await.unwrap();
                }
                let failed = Envelope::execute_failed(saga_id.to_string(), step_names::SCHEDULE_DELIVERY, vec![], "no courier available");
                orchestrator.handle_result(failed).await.unwrap();
                for step in compensations {
                    let ack = Envelope::compensated(saga_id.to_string(), step, vec![]);
                    orchestrator.handle_result(ack).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_start, bench_happy_path_six_steps, bench_compensation_fan_out);
criterion_main!(benches);
