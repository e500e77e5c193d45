//! PayOrderHandler - Command handler for confirming order payment.

use std::sync::Arc;

use crate::domain::foundation::{Cancellation, DomainError, ErrorCode, OrderId};
use crate::domain::order::{Order, OrderPaid};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{UnitOfWork, UnitOfWorkFactory};

/// Command to confirm payment for a pending order.
#[derive(Debug, Clone)]
pub struct PayOrderCommand {
    pub order_id: OrderId,
}

/// Result of successful payment confirmation.
#[derive(Debug, Clone)]
pub struct PayOrderResult {
    pub order: Order,
    pub event: OrderPaid,
}

/// Handler for paying orders.
pub struct PayOrderHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl PayOrderHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    pub async fn handle(
        &self,
        cmd: PayOrderCommand,
        cancel: &Cancellation,
    ) -> Result<PayOrderResult, DomainError> {
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
        cmd: PayOrderCommand,
        cancel: &Cancellation,
    ) -> Result<PayOrderResult, DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::cancelled("pay order"));
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

        let event = order.pay()?;
        uow.orders().update(&order).await?;

        let record = OutboxRecord::for_event(&event)?;
        uow.outbox().insert(&record).await?;

        uow.save(cancel).await?;
        uow.commit().await?;

        Ok(PayOrderResult { order, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDatabase, InMemoryUnitOfWorkFactory};
    use crate::application::handlers::customer::{
        RegisterCustomerCommand, RegisterCustomerHandler,
    };
    use crate::application::handlers::order::{PlaceOrderCommand, PlaceOrderHandler};
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
                    lines: vec![OrderLine::new("sku-1", 1, 700)],
                },
                &Cancellation::none(),
            )
            .await
            .unwrap()
            .order
            .id()
    }

    fn handler(db: &InMemoryDatabase) -> PayOrderHandler {
        PayOrderHandler::new(Arc::new(InMemoryUnitOfWorkFactory::new(db.clone())))
    }

    #[tokio::test]
    async fn pays_order_and_enqueues_event() {
        let db = InMemoryDatabase::new();
        let order_id = placed_order(&db).await;

        let result = handler(&db)
            .handle(PayOrderCommand { order_id }, &Cancellation::none())
            .await
            .unwrap();

        assert_eq!(result.order.status(), OrderStatus::Paid);
        assert_eq!(result.event.amount_cents, 700);
        assert_eq!(db.order(order_id).await.unwrap().status(), OrderStatus::Paid);

        let records = db.outbox_records().await;
        assert_eq!(records.last().unwrap().type_tag(), "courier.order.paid.v1");
    }

    #[tokio::test]
    async fn paying_twice_rolls_back_second_attempt() {
        let db = InMemoryDatabase::new();
        let order_id = placed_order(&db).await;
        let handler = handler(&db);

        handler
            .handle(PayOrderCommand { order_id }, &Cancellation::none())
            .await
            .unwrap();
        let outbox_before = db.outbox_records().await.len();

        let err = handler
            .handle(PayOrderCommand { order_id }, &Cancellation::none())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        // No second OrderPaid record made it into the outbox.
        assert_eq!(db.outbox_records().await.len(), outbox_before);
    }

    #[tokio::test]
    async fn unknown_order_fails() {
        let db = InMemoryDatabase::new();
        let err = handler(&db)
            .handle(
                PayOrderCommand {
                    order_id: OrderId::new(),
                },
                &Cancellation::none(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::OrderNotFound);
    }
}
