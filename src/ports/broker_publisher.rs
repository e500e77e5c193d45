//! BrokerPublisher port - stateless send of one identified message.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::{short_type_name, DomainError};

/// Media type of every outbox payload.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Header carrying the full event type tag on the wire.
pub const EVENT_TYPE_HEADER: &str = "event_type_full_name";

/// One message bound for the broker.
///
/// The message id equals the outbox record id, which is stable across
/// redeliveries so consumers can deduplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    /// Broker-level message id (= outbox record id).
    pub message_id: Uuid,

    /// Full event type tag, carried in the `event_type_full_name` header.
    pub type_tag: String,

    /// Self-contained JSON payload.
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn new(message_id: Uuid, type_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            message_id,
            type_tag: type_tag.into(),
            payload,
        }
    }

    /// Short event name used as the message subject and as the fallback
    /// destination name.
    pub fn subject(&self) -> &str {
        short_type_name(&self.type_tag)
    }
}

/// Port for publishing messages to the external broker.
///
/// Implementations must be safe for concurrent use. Failures are classified
/// through the error code: `TransientBroker` resolves on a later relay
/// cycle, `PermanentBroker` does not (but still only quarantines a record
/// once it reaches the attempts ceiling).
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Sends a single message. Returns once the broker has confirmed it.
    async fn publish(&self, message: BrokerMessage) -> Result<(), DomainError>;
}
