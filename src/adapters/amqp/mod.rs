//! AMQP broker adapter.

mod publisher;

pub use publisher::AmqpBrokerPublisher;
