//! Domain-event infrastructure.
//!
//! - `EventId` - unique identifier for event instances
//! - `DomainEvent` - object-safe trait all domain events implement
//! - `EventSchema` - adds the compile-time type tag used for registration
//! - `domain_event!` - macro to implement both with minimal boilerplate
//! - `encode_event` - event value → `(type_tag, payload)` wire pair

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

use super::{DomainError, ErrorCode, Timestamp};

/// Unique identifier for an event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random EventId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an EventId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait that all domain events must implement.
///
/// The type tag is a stable string uniquely naming the event schema
/// (e.g. "courier.order.placed.v1"). It is stored on the outbox record,
/// carried to the broker, and used by the registry to pick a decoder.
pub trait DomainEvent: Send + Sync + fmt::Debug {
    /// Returns the stable schema tag for this event.
    fn type_tag(&self) -> &'static str;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the unique ID for this event instance.
    fn event_id(&self) -> EventId;

    /// Downcast support for tests and typed consumers.
    fn as_any(&self) -> &dyn Any;
}

/// Compile-time companion to [`DomainEvent`].
///
/// Event types implement this to become registrable with the
/// [`EventRegistry`](super::EventRegistry): the associated constant supplies
/// the tag without an instance, and the serde bounds give the registry its
/// decoder.
pub trait EventSchema: DomainEvent + Serialize + DeserializeOwned {
    /// The schema tag; must match `DomainEvent::type_tag` for every instance.
    const TYPE_TAG: &'static str;
}

/// Macro to implement `DomainEvent` + `EventSchema` with minimal boilerplate.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// pub struct OrderPlaced {
///     pub event_id: EventId,
///     pub order_id: OrderId,
///     pub placed_at: Timestamp,
/// }
///
/// domain_event!(
///     OrderPlaced,
///     type_tag = "courier.order.placed.v1",
///     aggregate_id = order_id,
///     occurred_at = placed_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        type_tag = $type_tag:expr,
        aggregate_id = $agg_id_field:ident,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn type_tag(&self) -> &'static str {
                $type_tag
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        impl $crate::domain::foundation::EventSchema for $event_name {
            const TYPE_TAG: &'static str = $type_tag;
        }
    };
}

// Re-export the macro
pub use domain_event;

/// Encodes an event value into its `(type_tag, payload)` wire pair.
///
/// The payload is self-contained JSON; the tag comes from the schema
/// constant, so it is deterministic per event type.
pub fn encode_event<E: EventSchema>(event: &E) -> Result<(String, Vec<u8>), DomainError> {
    let payload = serde_json::to_vec(event).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Failed to encode event {}: {}", E::TYPE_TAG, e),
        )
    })?;
    Ok((E::TYPE_TAG.to_string(), payload))
}

/// Returns the short event name for a type tag: the last `.`-separated
/// segment, skipping a trailing version suffix such as `v1`.
///
/// `"courier.order.placed.v1"` → `"placed"`, `"OrderPlaced"` → `"OrderPlaced"`.
pub fn short_type_name(type_tag: &str) -> &str {
    let mut segments = type_tag.rsplit('.');
    match segments.next() {
        Some(last) if is_version_segment(last) => segments.next().unwrap_or(last),
        Some(last) => last,
        None => type_tag,
    }
}

fn is_version_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next() == Some('v') && chars.as_str().chars().all(|c| c.is_ascii_digit())
        && segment.len() > 1
}
