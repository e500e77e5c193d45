//! Outbox record entity and lifecycle.

mod record;

pub use record::OutboxRecord;
