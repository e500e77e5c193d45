//! Outbox store ports - transactional insert and relay-side fetch/mark.
//!
//! The outbox table is exclusively owned by the engine. The write side is
//! split from the read side because the two run in different scopes:
//!
//! - `OutboxWriter` is a unit-of-work handle; inserts land in the same
//!   transaction as the domain rows they describe.
//! - `OutboxStore` is pool-backed and used by the relay; every call is its
//!   own statement so one record's state update cannot be lost because of
//!   another's.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::outbox::OutboxRecord;

/// Transactional write handle for the outbox table.
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    /// Stages an insert of a fresh outbox record into the owning
    /// transaction. Records become visible to the relay only after that
    /// transaction commits.
    async fn insert(&self, record: &OutboxRecord) -> Result<(), DomainError>;
}

/// Relay-side store for fetching and resolving outbox records.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` unprocessed records with
    /// `attempts < max_attempts`, ordered by `occurred_on_utc` ascending,
    /// ties broken by id. The ordering is a preference, not a guarantee
    /// across concurrent relay instances.
    async fn fetch_unpublished(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError>;

    /// Marks a record as published. Idempotent: if the record is already
    /// processed the call is a no-op and the original timestamp survives.
    /// Clears `last_error` on the first (effective) call.
    async fn mark_processed(&self, id: Uuid, when: Timestamp) -> Result<(), DomainError>;

    /// Records a failed attempt: sets `last_error` and raises `attempts`
    /// to the given value (attempts never decrease).
    async fn mark_failed(&self, id: Uuid, error: &str, attempts: i32) -> Result<(), DomainError>;
}
