//! PlaceOrderHandler - Command handler for placing orders.

use std::sync::Arc;

use crate::domain::foundation::{Cancellation, CustomerId, DomainError, ErrorCode};
use crate::domain::order::{Order, OrderLine, OrderPlaced};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{UnitOfWork, UnitOfWorkFactory};

/// Command to place a new order for an existing customer.
#[derive(Debug, Clone)]
pub struct PlaceOrderCommand {
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
}

/// Result of successful order placement.
#[derive(Debug, Clone)]
pub struct PlaceOrderResult {
    pub order: Order,
    pub event: OrderPlaced,
}

/// Handler for placing orders.
pub struct PlaceOrderHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl PlaceOrderHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    pub async fn handle(
        &self,
        cmd: PlaceOrderCommand,
        cancel: &Cancellation,
    ) -> Result<PlaceOrderResult, DomainError> {
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
        cmd: PlaceOrderCommand,
        cancel: &Cancellation,
    ) -> Result<PlaceOrderResult, DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::cancelled("place order"));
        }

        let customer = uow
            .customers()
            .find_by_id(cmd.customer_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::CustomerNotFound,
                    format!("Customer not found: {}", cmd.customer_id),
                )
            })?;

        let (order, event) = Order::place(customer.id(), cmd.lines)?;
        uow.orders().insert(&order).await?;

        let record = OutboxRecord::for_event(&event)?;
        uow.outbox().insert(&record).await?;

        uow.save(cancel).await?;
        uow.commit().await?;

        Ok(PlaceOrderResult { order, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDatabase, InMemoryUnitOfWorkFactory};
    use crate::application::handlers::customer::{
        RegisterCustomerCommand, RegisterCustomerHandler,
    };

    async fn registered_customer(db: &InMemoryDatabase) -> CustomerId {
        let handler =
            RegisterCustomerHandler::new(Arc::new(InMemoryUnitOfWorkFactory::new(db.clone())));
        let result = handler
            .handle(
                RegisterCustomerCommand {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap();
        result.customer.id()
    }

    fn handler(db: &InMemoryDatabase) -> PlaceOrderHandler {
        PlaceOrderHandler::new(Arc::new(InMemoryUnitOfWorkFactory::new(db.clone())))
    }

    fn lines() -> Vec<OrderLine> {
        vec![OrderLine::new("sku-1", 2, 500)]
    }

    #[tokio::test]
    async fn places_order_and_enqueues_event() {
        let db = InMemoryDatabase::new();
        let customer_id = registered_customer(&db).await;

        let result = handler(&db)
            .handle(
                PlaceOrderCommand {
                    customer_id,
                    lines: lines(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap();

        assert_eq!(db.order_count().await, 1);
        assert_eq!(result.event.total_cents, 1000);

        let records = db.outbox_records().await;
        // One from registration, one from placement
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].type_tag(), "courier.order.placed.v1");
    }

    #[tokio::test]
    async fn unknown_customer_fails_without_side_effects() {
        let db = InMemoryDatabase::new();

        let err = handler(&db)
            .handle(
                PlaceOrderCommand {
                    customer_id: CustomerId::new(),
                    lines: lines(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::CustomerNotFound);
        assert_eq!(db.order_count().await, 0);
        assert!(db.outbox_records().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_lines_roll_back() {
        let db = InMemoryDatabase::new();
        let customer_id = registered_customer(&db).await;
        let outbox_before = db.outbox_records().await.len();

        let err = handler(&db)
            .handle(
                PlaceOrderCommand {
                    customer_id,
                    lines: vec![],
                },
                &Cancellation::none(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(db.order_count().await, 0);
        assert_eq!(db.outbox_records().await.len(), outbox_before);
    }
}
