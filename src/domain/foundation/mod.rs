//! Foundation types shared by every layer of the engine.
//!
//! - `DomainError` / `ErrorCode` - the crate's error taxonomy
//! - `DomainEvent` / `EventSchema` / `EventId` - event contracts
//! - `EventRegistry` - explicit type-tag → decoder registry
//! - `Cancellation` - cooperative cancellation signal
//! - `Timestamp` - UTC point-in-time value object
//! - `CustomerId` / `OrderId` - strongly-typed identifiers

mod cancellation;
mod errors;
mod events;
mod ids;
mod registry;
mod timestamp;

pub use cancellation::Cancellation;
pub use errors::{DomainError, ErrorCode};
pub use events::{domain_event, encode_event, short_type_name, DomainEvent, EventId, EventSchema};
pub use ids::{CustomerId, OrderId};
pub use registry::EventRegistry;
pub use timestamp::Timestamp;
