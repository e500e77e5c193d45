//! UnitOfWork port - scoped holder of one database transaction.
//!
//! A unit of work owns a single transaction plus the repository handles
//! that participate in it. Command handlers drive it through a fixed
//! protocol: `begin` → stage writes through the repositories → `save` →
//! `commit`, with `rollback` on every failure path.
//!
//! Writes issued through the handles are staged in emission order and only
//! reach the database on `save`. Because nothing is committed until
//! `commit`, `save` can retry transient database faults by replaying the
//! staged writes in a fresh transaction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{Cancellation, DomainError};

use super::{CustomerRepository, OrderRepository, OutboxWriter};

/// Port for a scoped database transaction with participating repositories.
///
/// # Errors
///
/// - `begin` fails with `TransactionAlreadyActive` if a transaction is
///   already open on this handle.
/// - `save` and `commit` fail with `TransactionNotActive` if none is.
/// - `save` retries transient faults per the configured policy and surfaces
///   the last error once retries are exhausted; fatal faults surface
///   immediately.
/// - `commit` surfaces the commit error; the failed transaction is
///   abandoned, which is the implicit rollback.
/// - `rollback` is best-effort and never errors.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// In-transaction customer repository handle.
    fn customers(&self) -> Arc<dyn CustomerRepository>;

    /// In-transaction order repository handle.
    fn orders(&self) -> Arc<dyn OrderRepository>;

    /// In-transaction outbox writer handle.
    fn outbox(&self) -> Arc<dyn OutboxWriter>;

    /// Starts a new transaction on this handle.
    async fn begin(&self) -> Result<(), DomainError>;

    /// Flushes staged writes into the open transaction without committing.
    async fn save(&self, cancel: &Cancellation) -> Result<(), DomainError>;

    /// Commits the open transaction, flushing any remaining staged writes.
    async fn commit(&self) -> Result<(), DomainError>;

    /// Rolls back and discards the open transaction, if any.
    async fn rollback(&self);
}

/// Factory creating one unit of work per command execution.
pub trait UnitOfWorkFactory: Send + Sync {
    /// Creates a fresh handle with no active transaction.
    fn create(&self) -> Arc<dyn UnitOfWork>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that the traits are object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn UnitOfWork, _: &dyn UnitOfWorkFactory) {}
}
