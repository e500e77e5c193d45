//! CancelOrderHandler - Command handler for cancelling pending orders.

use std::sync::Arc;

use crate::domain::foundation::{Cancellation, DomainError, ErrorCode, OrderId};
use crate::domain::order::{Order, OrderCancelled};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{UnitOfWork, UnitOfWorkFactory};

/// Command to cancel a pending order.
#[derive(Debug, Clone)]
pub struct CancelOrderCommand {
    pub order_id: OrderId,
    pub reason: String,
}

/// Result of successful cancellation.
#[derive(Debug, Clone)]
pub struct CancelOrderResult {
    pub order: Order,
    pub event: OrderCancelled,
}

/// Handler for cancelling orders.
pub struct CancelOrderHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl CancelOrderHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    pub async fn handle(
        &self,
        cmd: CancelOrderCommand,
        cancel: &Cancellation,
    ) -> Result<CancelOrderResult, DomainError> {
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
        cmd: CancelOrderCommand,
        cancel: &Cancellation,
    ) -> Result<CancelOrderResult, DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::cancelled("cancel order"));
        }

        let mut order = uow
            .orders()
            .find_by_id(cmd.order_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::OrderNotFound,
                    format!("Order not found: {}", cmd.order_id),
                )
            })?;

        let event = order.cancel(cmd.reason)?;
        uow.orders().update(&order).await?;

        let record = OutboxRecord::for_event(&event)?;
        uow.outbox().insert(&record).await?;

        uow.save(cancel).await?;
        uow.commit().await?;

        Ok(CancelOrderResult { order, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDatabase, InMemoryUnitOfWorkFactory};
    use crate::application::handlers::customer::{
        RegisterCustomerCommand, RegisterCustomerHandler,
    };
    use crate::application::handlers::order::{
        PayOrderCommand, PayOrderHandler, PlaceOrderCommand, PlaceOrderHandler,
    };
    use crate::domain::order::{OrderLine, OrderStatus};

    async fn placed_order(db: &InMemoryDatabase) -> OrderId {
        let factory = Arc::new(InMemoryUnitOfWorkFactory::new(db.clone()));
        let customer = RegisterCustomerHandler::new(factory.clone())
            .handle(
                RegisterCustomerCommand {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap()
            .customer;

        PlaceOrderHandler::new(factory)
            .handle(
                PlaceOrderCommand {
                    customer_id: customer.id(),
                    lines: vec![OrderLine::new("sku-1", 1, 400)],
                },
                &Cancellation::none(),
            )
            .await
            .unwrap()
            .order
            .id()
    }

    #[tokio::test]
    async fn cancels_pending_order_and_enqueues_event() {
        let db = InMemoryDatabase::new();
        let order_id = placed_order(&db).await;

        let handler =
            CancelOrderHandler::new(Arc::new(InMemoryUnitOfWorkFactory::new(db.clone())));
        let result = handler
            .handle(
                CancelOrderCommand {
                    order_id,
                    reason: "out of stock".to_string(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap();

        assert_eq!(result.order.status(), OrderStatus::Cancelled);
        assert_eq!(result.event.reason, "out of stock");

        let records = db.outbox_records().await;
        assert_eq!(
            records.last().unwrap().type_tag(),
            "courier.order.cancelled.v1"
        );
    }

    #[tokio::test]
    async fn paid_order_cannot_be_cancelled() {
        let db = InMemoryDatabase::new();
        let order_id = placed_order(&db).await;
        let factory = Arc::new(InMemoryUnitOfWorkFactory::new(db.clone()));

        PayOrderHandler::new(factory.clone())
            .handle(PayOrderCommand { order_id }, &Cancellation::none())
            .await
            .unwrap();
        let outbox_before = db.outbox_records().await.len();

        let err = CancelOrderHandler::new(factory)
            .handle(
                CancelOrderCommand {
                    order_id,
                    reason: "too late".to_string(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(db.order(order_id).await.unwrap().status(), OrderStatus::Paid);
        assert_eq!(db.outbox_records().await.len(), outbox_before);
    }
}
