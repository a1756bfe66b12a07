//! Order saga engine entry point: wires the messaging adapter, Saga State
//! Store, Order Record Store, reference participants, and the orchestrator's
//! result-consumer loop into one running process, then serves the
//! `/health` + `/metrics` observability surface (§2, §4.4).

use engine::config::Config;
use engine::error::{EngineError, Result};
use messaging::{InMemoryMessageBus, MessageBus, RabbitMessageBus};
use order_record::{InMemoryOrderRecordStore, OrderRecordStore, PostgresOrderRecordStore};
use saga::{Orchestrator, SagaDefinition};
use saga_store::{InMemorySagaStateStore, PostgresSagaStateStore, SagaStateStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Declares topology, spawns the reference participants and the
/// orchestrator's result consumer, then serves the observability HTTP
/// surface until a shutdown signal arrives. Generic over the messaging,
/// Saga State, and Order Record collaborators so the same wiring runs
/// against either the in-memory or the Postgres/RabbitMQ-backed stack.
async fn run<MB, SSS, ORS>(config: Config, bus: MB, store: SSS, orders: ORS) -> Result<()>
where
    MB: MessageBus + Clone + 'static,
    SSS: SagaStateStore + 'static,
    ORS: OrderRecordStore + 'static,
{
    let orchestrator = Orchestrator::new(SagaDefinition::reference_sequence(), bus.clone(), store, orders)
        .with_publish_retries(config.publish_retries);

    let _participant_handles = engine::spawn_reference_participants(bus.clone()).await?;

    let result_consumer_bus = bus.clone();
    tokio::spawn(async move {
        if let Err(e) = engine::run_result_consumer(orchestrator, result_consumer_bus).await {
            tracing::error!(error = %e, "orchestrator result consumer exited");
        }
    });

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder.install_recorder().expect("failed to install Prometheus recorder");

    let app = engine::build_router(metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting order saga engine");

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| EngineError::Server(e.to_string()))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EngineError::Server(e.to_string()))?;

    tracing::info!("order saga engine shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(?config, "loaded configuration");

    let result = match (&config.amqp_url, &config.database_url) {
        (Some(amqp_url), Some(database_url)) => {
            let bus = RabbitMessageBus::new(amqp_url.clone());
            let pool = sqlx::PgPool::connect(database_url).await.expect("failed to connect to Postgres");

            let store = PostgresSagaStateStore::new(pool.clone());
            store.run_migrations().await.expect("saga-store migrations failed");

            let orders = PostgresOrderRecordStore::new(pool);
            orders.run_migrations().await.expect("order-record migrations failed");

            run(config, bus, store, orders).await
        }
        (Some(_), None) | (None, Some(_)) => {
            panic!("AMQP_URL and DATABASE_URL must be set together, or both left unset for the in-memory stack");
        }
        (None, None) => {
            tracing::warn!("AMQP_URL/DATABASE_URL unset; running against in-memory adapters");
            let bus = InMemoryMessageBus::new();
            let store = InMemorySagaStateStore::new();
            let orders = InMemoryOrderRecordStore::new();
            run(config, bus, store, orders).await
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "order saga engine terminated with an error");
        std::process::exit(1);
    }
}
