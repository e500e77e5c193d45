//! Event Courier service binary.
//!
//! Wires configuration, the Postgres pool, the AMQP publisher and the
//! outbox relay, then runs until ctrl-c.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use event_courier::adapters::{
    AmqpBrokerPublisher, OutboxRelay, OutboxRelayConfig, PostgresOutboxStore,
};
use event_courier::config::AppConfig;
use event_courier::domain::customer::CustomerRegistered;
use event_courier::domain::foundation::EventRegistry;
use event_courier::domain::order::{OrderCancelled, OrderPaid, OrderPlaced};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;
    info!("Connected to database");

    let broker = Arc::new(AmqpBrokerPublisher::connect(config.broker.clone()).await?);

    let registry = Arc::new(event_registry());

    let store = Arc::new(PostgresOutboxStore::new(
        pool.clone(),
        config.relay.max_attempts,
        config.relay.worker_id.clone(),
        config.relay.claim_expiry(),
    ));

    let relay_config = OutboxRelayConfig::default()
        .with_poll_interval(config.relay.poll_interval())
        .with_batch_size(config.relay.batch_size)
        .with_max_attempts(config.relay.max_attempts);

    let relay = Arc::new(OutboxRelay::with_config(
        store,
        registry,
        broker,
        relay_config,
    ));
    let handle = relay.clone().spawn();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining relay");
    handle.stop().await;

    let health = relay.health();
    if !health.healthy {
        error!(
            last_error = health.last_error.as_deref().unwrap_or("unknown"),
            "Relay was unhealthy at shutdown"
        );
    }

    pool.close().await;
    info!("Event courier stopped");
    Ok(())
}

/// Registers every event schema the relay may need to decode.
fn event_registry() -> EventRegistry {
    let mut registry = EventRegistry::new();
    registry
        .register::<CustomerRegistered>()
        .register::<OrderPlaced>()
        .register::<OrderPaid>()
        .register::<OrderCancelled>();
    registry
}
