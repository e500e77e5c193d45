//! Explicit event-type registry for payload decoding.
//!
//! Every event schema is registered under its type tag at startup; decoding
//! looks the tag up and runs the registered decoder. Unknown tags and
//! unparseable payloads are first-class errors, which the relay treats as
//! permanent failures.

use std::collections::HashMap;

use super::{DomainError, DomainEvent, ErrorCode, EventSchema};

type DecoderFn = fn(&[u8]) -> Result<Box<dyn DomainEvent>, serde_json::Error>;

/// Registry mapping event type tags to decoder functions.
///
/// # Example
///
/// ```ignore
/// let mut registry = EventRegistry::new();
/// registry.register::<OrderPlaced>();
/// registry.register::<OrderPaid>();
///
/// let event = registry.decode(&record.type_tag, &record.payload)?;
/// ```
#[derive(Default)]
pub struct EventRegistry {
    decoders: HashMap<&'static str, DecoderFn>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers an event schema under its type tag.
    ///
    /// Re-registering the same tag replaces the decoder; tags are expected
    /// to be unique per schema.
    pub fn register<E: EventSchema + 'static>(&mut self) -> &mut Self {
        self.decoders.insert(E::TYPE_TAG, decode_into::<E>);
        self
    }

    /// True if a decoder is registered for the tag.
    pub fn knows(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// True if no schema has been registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes a payload according to its type tag.
    ///
    /// # Errors
    ///
    /// - `UnknownEventType` if the tag has no registered schema
    /// - `MalformedPayload` if the payload does not parse into the schema
    pub fn decode(
        &self,
        type_tag: &str,
        payload: &[u8],
    ) -> Result<Box<dyn DomainEvent>, DomainError> {
        let decoder = self.decoders.get(type_tag).ok_or_else(|| {
            DomainError::new(
                ErrorCode::UnknownEventType,
                format!("No event schema registered for type tag '{}'", type_tag),
            )
        })?;

        decoder(payload).map_err(|e| {
            DomainError::new(
                ErrorCode::MalformedPayload,
                format!("Payload for '{}' failed to decode: {}", type_tag, e),
            )
        })
    }
}

fn decode_into<E: EventSchema + 'static>(
    payload: &[u8],
) -> Result<Box<dyn DomainEvent>, serde_json::Error> {
    let event: E = serde_json::from_slice(payload)?;
    Ok(Box::new(event))
}
