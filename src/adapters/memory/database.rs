//! Shared in-memory database state for the test adapters.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::customer::Customer;
use crate::domain::foundation::{CustomerId, OrderId};
use crate::domain::order::Order;
use crate::domain::outbox::OutboxRecord;

#[derive(Default)]
pub(super) struct DbState {
    pub customers: HashMap<CustomerId, Customer>,
    pub orders: HashMap<OrderId, Order>,
    pub outbox: Vec<OutboxRecord>,
}

/// Committed state shared between the in-memory unit of work and the
/// in-memory outbox store. Cloning shares the underlying storage, the way
/// two pool handles share one database.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    pub(super) state: Arc<RwLock<DbState>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test helpers ===

    /// Inserts an outbox record directly, bypassing the unit of work.
    ///
    /// Used to seed records the enqueue path would never produce, such as
    /// rows with unknown type tags.
    pub async fn seed_outbox_record(&self, record: OutboxRecord) {
        self.state.write().await.outbox.push(record);
    }

    /// Returns a snapshot of every outbox record.
    pub async fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.state.read().await.outbox.clone()
    }

    /// Returns the outbox record with the given id, if any.
    pub async fn outbox_record(&self, id: Uuid) -> Option<OutboxRecord> {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Number of committed customers.
    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the committed order with the given id, if any.
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.read().await.orders.get(&id).cloned()
    }

    /// Returns the committed customer with the given id, if any.
    pub async fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.state.read().await.customers.get(&id).cloned()
    }
}
