//! OrderRepository port - in-transaction view of the orders table.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::Order;

/// Repository handle scoped to a unit of work.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stages an insert of a new order.
    async fn insert(&self, order: &Order) -> Result<(), DomainError>;

    /// Stages an update of an existing order.
    async fn update(&self, order: &Order) -> Result<(), DomainError>;

    /// Loads an order by id from the open transaction.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError>;
}
