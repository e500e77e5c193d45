//! In-memory adapters for testing.
//!
//! Deterministic doubles of the database and broker seams, used by handler
//! unit tests and the end-to-end suite. Not for production use: errors are
//! structural only and locks panic when poisoned.

mod broker;
mod database;
mod outbox_store;
mod unit_of_work;

pub use broker::RecordingBroker;
pub use database::InMemoryDatabase;
pub use outbox_store::InMemoryOutboxStore;
pub use unit_of_work::{InMemoryUnitOfWork, InMemoryUnitOfWorkFactory};
