//! Process wiring for the order saga engine (§2, §4.4; SPEC_FULL.md "Ambient
//! stack"): the orchestrator's result-consumer loop, one consumer loop per
//! reference-sequence participant, and a minimal `/health` + `/metrics` HTTP
//! surface, matching the teacher `api` crate's `create_app`/`routes` shape.
//! The CRUD HTTP surface spec.md places out of scope (§1) is not part of
//! this crate; this is observability only.

pub mod config;
pub mod error;
pub mod routes;

use axum::Router;
use axum::routing::get;
use futures_util::StreamExt;
use messaging::{Envelope, MessageBus, MessageDelivery};
use metrics_exporter_prometheus::PrometheusHandle;
use order_record::OrderRecordStore;
use participant_sdk::ParticipantRuntime;
use participants::{
    BillingParticipant, CreateOrderParticipant, DeliveryParticipant, InMemoryBillingService,
    InMemoryDeliveryService, InMemoryNotificationService, InMemoryPaymentGateway, InMemoryWarehouseService,
    NotifyParticipant, PaymentParticipant, WarehouseParticipant,
};
use saga::Orchestrator;
use saga_store::SagaStateStore;
use tower_http::trace::TraceLayer;

use error::Result;

/// Builds the observability router: `GET /health` and `GET /metrics`.
pub fn build_router(metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new().route("/metrics", get(routes::metrics::get)).with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Declares both saga topics and spawns one long-running consumer task per
/// reference-sequence step (§4.3 "Participant Base"), wired to in-memory
/// domain services. Each participant's own domain logic is an external
/// collaborator out of scope for this engine (§1); wiring it against a real
/// billing/payment/warehouse/delivery backend is a matter of swapping the
/// `InMemory*` type for one implementing the same trait.
///
/// Returns one join handle per step; the caller is expected to hold these
/// for the lifetime of the process (dropping them does not stop the tasks,
/// but losing the handles means shutdown can't be awaited).
pub async fn spawn_reference_participants<MB>(bus: MB) -> Result<Vec<tokio::task::JoinHandle<()>>>
where
    MB: MessageBus + Clone + 'static,
{
    bus.declare_topology().await?;

    let mut handles = Vec::new();

    let create_order = ParticipantRuntime::new(CreateOrderParticipant::new(), bus.clone());
    handles.push(spawn_runtime(create_order).await?);

    let billing = ParticipantRuntime::new(BillingParticipant::new(InMemoryBillingService::new()), bus.clone());
    handles.push(spawn_runtime(billing).await?);

    let payment = ParticipantRuntime::new(PaymentParticipant::new(InMemoryPaymentGateway::new()), bus.clone());
    handles.push(spawn_runtime(payment).await?);

    let warehouse = ParticipantRuntime::new(WarehouseParticipant::new(InMemoryWarehouseService::new()), bus.clone());
    handles.push(spawn_runtime(warehouse).await?);

    let delivery = ParticipantRuntime::new(DeliveryParticipant::new(InMemoryDeliveryService::new()), bus.clone());
    handles.push(spawn_runtime(delivery).await?);

    let notify = ParticipantRuntime::new(NotifyParticipant::new(InMemoryNotificationService::new()), bus.clone());
    handles.push(spawn_runtime(notify).await?);

    Ok(handles)
}

async fn spawn_runtime<H, MB>(runtime: ParticipantRuntime<H, MB>) -> Result<tokio::task::JoinHandle<()>>
where
    H: participant_sdk::ParticipantHandler + 'static,
    MB: MessageBus + 'static,
{
    runtime.declare_topology().await?;
    Ok(tokio::spawn(async move {
        if let Err(e) = runtime.run().await {
            tracing::error!(error = %e, "participant runtime exited");
        }
    }))
}

/// Runs the orchestrator's `SetupConsumer` loop (§4.2): declares
/// `order.saga_results` bound with `saga.*.result`, and for every inbound
/// reply calls [`Orchestrator::handle_result`], acking on success and
/// nacking-with-requeue on failure so the broker redelivers (§4.4 "Consume").
pub async fn run_result_consumer<MB, SSS, ORS>(orchestrator: Orchestrator<MB, SSS, ORS>, bus: MB) -> Result<()>
where
    MB: MessageBus,
    SSS: SagaStateStore,
    ORS: OrderRecordStore,
{
    bus.declare_topology().await?;
    bus.declare_queue(messaging::routing::RESULT_QUEUE).await?;
    bus.bind_queue(messaging::routing::RESULT_QUEUE, messaging::routing::SAGA_EXCHANGE, messaging::routing::RESULT_BINDING)
        .await?;

    let mut stream = bus.consume(messaging::routing::RESULT_QUEUE).await?;
    while let Some(delivery) = stream.next().await {
        match Envelope::from_bytes(delivery.body()) {
            Ok(envelope) => match orchestrator.handle_result(envelope).await {
                Ok(()) => delivery.ack().await?,
                Err(e) => {
                    tracing::error!(error = %e, "handle_result failed; nacking for redelivery");
                    delivery.nack(true).await?;
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to decode saga result envelope; nacking without requeue");
                delivery.nack(false).await?;
            }
        }
    }
    Ok(())
}
