//! CustomerRepository port - in-transaction view of the customers table.

use async_trait::async_trait;

use crate::domain::customer::Customer;
use crate::domain::foundation::{CustomerId, DomainError};

/// Repository handle scoped to a unit of work.
///
/// `insert` stages a write into the owning transaction; `find_by_id` reads
/// through the open transaction.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Stages an insert of a new customer.
    async fn insert(&self, customer: &Customer) -> Result<(), DomainError>;

    /// Loads a customer by id from the open transaction.
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError>;
}
