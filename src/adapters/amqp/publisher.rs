//! AMQP (RabbitMQ) implementation of the BrokerPublisher port.
//!
//! Messages go to the default exchange routed straight to a durable queue.
//! The AMQP basic properties carry the engine's message contract:
//! `message_id` and `correlation_id` are the outbox record id, `kind` is
//! the short event name, `content_type` is `application/json`, and the
//! full type tag travels in the `event_type_full_name` header.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{BrokerMessage, BrokerPublisher, CONTENT_TYPE_JSON, EVENT_TYPE_HEADER};

/// AMQP broker publisher.
///
/// Channel objects are cached per destination queue behind a concurrent
/// map; a dead channel or connection is replaced on the next publish.
pub struct AmqpBrokerPublisher {
    config: BrokerConfig,
    connection: Mutex<Option<Connection>>,
    channels: RwLock<HashMap<String, Channel>>,
    warned_destinations: StdMutex<HashSet<String>>,
}

impl AmqpBrokerPublisher {
    /// Connects to the broker and verifies the connection.
    pub async fn connect(config: BrokerConfig) -> Result<Self, DomainError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| classify_lapin_error("Failed to connect to broker", e))?;

        info!(url = %config.url, "Connected to AMQP broker");

        Ok(Self {
            config,
            connection: Mutex::new(Some(connection)),
            channels: RwLock::new(HashMap::new()),
            warned_destinations: StdMutex::new(HashSet::new()),
        })
    }

    /// Resolves the destination queue for a message.
    ///
    /// Falls back to a queue named after the event's short name when no
    /// destination is configured, warning once per derived name.
    fn destination_for(&self, message: &BrokerMessage) -> String {
        match &self.config.destination {
            Some(destination) => destination.clone(),
            None => {
                let derived = message.subject().to_string();
                let mut warned = self
                    .warned_destinations
                    .lock()
                    .expect("warned destination set poisoned");
                if warned.insert(derived.clone()) {
                    warn!(
                        destination = %derived,
                        type_tag = %message.type_tag,
                        "No broker destination configured, deriving queue from event name"
                    );
                }
                derived
            }
        }
    }

    /// Returns a live channel for the destination, creating and caching one
    /// (with the queue declared durable and confirms enabled) as needed.
    async fn channel_for(&self, destination: &str) -> Result<Channel, DomainError> {
        {
            let channels = self.channels.read().await;
            if let Some(channel) = channels.get(destination) {
                if channel.status().connected() {
                    return Ok(channel.clone());
                }
            }
        }

        let mut channels = self.channels.write().await;
        // Another task may have replaced the channel while we waited.
        if let Some(channel) = channels.get(destination) {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
        }

        let channel = self.open_channel(destination).await?;
        channels.insert(destination.to_string(), channel.clone());
        Ok(channel)
    }

    async fn open_channel(&self, destination: &str) -> Result<Channel, DomainError> {
        let mut connection = self.connection.lock().await;

        let needs_reconnect = match connection.as_ref() {
            Some(conn) => !conn.status().connected(),
            None => true,
        };
        if needs_reconnect {
            let conn = Connection::connect(&self.config.url, ConnectionProperties::default())
                .await
                .map_err(|e| classify_lapin_error("Failed to reconnect to broker", e))?;
            info!(url = %self.config.url, "Reconnected to AMQP broker");
            *connection = Some(conn);
        }

        let conn = connection.as_ref().expect("connection just ensured");
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| classify_lapin_error("Failed to create channel", e))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| classify_lapin_error("Failed to enable publisher confirms", e))?;

        channel
            .queue_declare(
                destination,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| classify_lapin_error("Failed to declare queue", e))?;

        debug!(queue = %destination, "Opened broker channel");
        Ok(channel)
    }
}

#[async_trait]
impl BrokerPublisher for AmqpBrokerPublisher {
    async fn publish(&self, message: BrokerMessage) -> Result<(), DomainError> {
        let destination = self.destination_for(&message);
        let channel = self.channel_for(&destination).await?;

        let id = message.message_id.to_string();
        let mut headers = FieldTable::default();
        headers.insert(
            EVENT_TYPE_HEADER.into(),
            AMQPValue::LongString(message.type_tag.as_str().into()),
        );

        let properties = BasicProperties::default()
            .with_message_id(id.as_str().into())
            .with_correlation_id(id.as_str().into())
            .with_content_type(CONTENT_TYPE_JSON.into())
            .with_kind(message.subject().into())
            .with_headers(headers)
            .with_delivery_mode(2); // persistent

        let confirm = channel
            .basic_publish(
                "",
                &destination,
                BasicPublishOptions::default(),
                &message.payload,
                properties,
            )
            .await
            .map_err(|e| classify_lapin_error("Failed to publish message", e))?
            .await
            .map_err(|e| classify_lapin_error("Publish confirmation failed", e))?;

        if let Confirmation::Nack(_) = confirm {
            return Err(DomainError::new(
                ErrorCode::TransientBroker,
                format!("Broker nacked message {}", message.message_id),
            ));
        }

        debug!(
            message_id = %message.message_id,
            queue = %destination,
            type_tag = %message.type_tag,
            "Published outbox message"
        );
        Ok(())
    }
}

/// Maps a lapin error onto the engine's taxonomy.
///
/// Protocol rejections that configuration cannot outwait (access refused,
/// unknown destination, resource locked, not allowed) are permanent;
/// everything else (io, closed channels, heartbeat loss) is transient.
fn classify_lapin_error(context: &str, error: lapin::Error) -> DomainError {
    let code = match &error {
        lapin::Error::ProtocolError(amqp) => match amqp.get_id() {
            403 | 404 | 405 | 530 => ErrorCode::PermanentBroker,
            _ => ErrorCode::TransientBroker,
        },
        _ => ErrorCode::TransientBroker,
    };
    DomainError::new(code, format!("{}: {}", context, error))
}
