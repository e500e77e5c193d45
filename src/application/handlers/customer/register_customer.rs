//! RegisterCustomerHandler - Command handler for registering customers.

use std::sync::Arc;

use crate::domain::customer::{Customer, CustomerRegistered};
use crate::domain::foundation::{Cancellation, DomainError};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{UnitOfWork, UnitOfWorkFactory};

/// Command to register a new customer.
#[derive(Debug, Clone)]
pub struct RegisterCustomerCommand {
    pub name: String,
    pub email: String,
}

/// Result of successful registration.
#[derive(Debug, Clone)]
pub struct RegisterCustomerResult {
    pub customer: Customer,
    pub event: CustomerRegistered,
}

/// Handler for registering customers.
///
/// One transactional attempt per call: the customer row and the outbox
/// record describing `CustomerRegistered` commit together or not at all.
pub struct RegisterCustomerHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl RegisterCustomerHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    pub async fn handle(
        &self,
        cmd: RegisterCustomerCommand,
        cancel: &Cancellation,
    ) -> Result<RegisterCustomerResult, DomainError> {
        let uow = self.uow_factory.create();
        uow.begin().await?;

        match Self::execute(&*uow, cmd, cancel).await {
            Ok(result) => Ok(result),
            Err(err) => {
                uow.rollback().await;
                Err(err)
            }
        }
    }

    async fn execute(
        uow: &dyn UnitOfWork,
        cmd: RegisterCustomerCommand,
        cancel: &Cancellation,
    ) -> Result<RegisterCustomerResult, DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::cancelled("register customer"));
        }

        let (customer, event) = Customer::register(cmd.name, cmd.email)?;
        uow.customers().insert(&customer).await?;

        let record = OutboxRecord::for_event(&event)?;
        uow.outbox().insert(&record).await?;

        uow.save(cancel).await?;
        uow.commit().await?;

        Ok(RegisterCustomerResult { customer, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDatabase, InMemoryUnitOfWorkFactory};
    use crate::domain::foundation::ErrorCode;

    fn handler(db: &InMemoryDatabase) -> RegisterCustomerHandler {
        RegisterCustomerHandler::new(Arc::new(InMemoryUnitOfWorkFactory::new(db.clone())))
    }

    fn command() -> RegisterCustomerCommand {
        RegisterCustomerCommand {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn registers_customer_and_enqueues_event() {
        let db = InMemoryDatabase::new();
        let result = handler(&db)
            .handle(command(), &Cancellation::none())
            .await
            .unwrap();

        assert_eq!(db.customer_count().await, 1);

        let records = db.outbox_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].type_tag(), "courier.customer.registered.v1");
        assert_eq!(records[0].attempts(), 0);
        assert!(records[0].processed_on_utc().is_none());
        assert_eq!(result.event.customer_id, result.customer.id());
    }

    #[tokio::test]
    async fn validation_failure_persists_nothing() {
        let db = InMemoryDatabase::new();
        let err = handler(&db)
            .handle(
                RegisterCustomerCommand {
                    name: "".to_string(),
                    email: "ada@example.com".to_string(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(db.customer_count().await, 0);
        assert!(db.outbox_records().await.is_empty());
    }

    #[tokio::test]
    async fn cancellation_rolls_back_before_any_work() {
        let db = InMemoryDatabase::new();
        let (tx, cancel) = Cancellation::channel();
        tx.send(true).unwrap();

        let err = handler(&db).handle(command(), &cancel).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::Cancelled);
        assert_eq!(db.customer_count().await, 0);
        assert!(db.outbox_records().await.is_empty());
    }
}
