//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `amqp` - AMQP broker publisher
//! - `events` - outbox relay worker
//! - `memory` - in-memory test doubles
//! - `postgres` - PostgreSQL unit of work and outbox store

pub mod amqp;
pub mod events;
pub mod memory;
pub mod postgres;

pub use amqp::AmqpBrokerPublisher;
pub use events::{
    CycleReport, OutboxRelay, OutboxRelayConfig, RelayHandle, RelayHealth, RelayMetricsSnapshot,
};
pub use memory::{
    InMemoryDatabase, InMemoryOutboxStore, InMemoryUnitOfWork, InMemoryUnitOfWorkFactory,
    RecordingBroker,
};
pub use postgres::{
    PostgresOutboxStore, PostgresUnitOfWork, PostgresUnitOfWorkFactory, SaveRetryPolicy,
};
