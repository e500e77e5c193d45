//! Order aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, EventId, OrderId, Timestamp,
};

use super::{OrderCancelled, OrderPaid, OrderPlaced};

/// A single line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderLine {
    pub fn new(sku: impl Into<String>, quantity: u32, unit_price_cents: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_price_cents,
        }
    }

    fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

/// An order placed by a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    total_cents: i64,
    placed_at: Timestamp,
    updated_at: Timestamp,
}

impl Order {
    /// Places a new order, emitting `OrderPlaced`.
    pub fn place(
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
    ) -> Result<(Self, OrderPlaced), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "lines",
                "An order must contain at least one line",
            ));
        }
        for line in &lines {
            if line.sku.trim().is_empty() {
                return Err(DomainError::validation("sku", "Line sku cannot be empty"));
            }
            if line.quantity == 0 {
                return Err(DomainError::validation(
                    "quantity",
                    "Line quantity must be positive",
                ));
            }
            if line.unit_price_cents <= 0 {
                return Err(DomainError::validation(
                    "unit_price_cents",
                    "Line unit price must be positive",
                ));
            }
        }

        let total_cents = lines.iter().map(OrderLine::subtotal_cents).sum();
        let placed_at = Timestamp::now();
        let order = Self {
            id: OrderId::new(),
            customer_id,
            lines,
            status: OrderStatus::Pending,
            total_cents,
            placed_at,
            updated_at: placed_at,
        };

        let event = OrderPlaced {
            event_id: EventId::new(),
            order_id: order.id,
            customer_id,
            lines: order.lines.clone(),
            total_cents,
            placed_at,
        };

        Ok((order, event))
    }

    /// Rebuilds an order from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        status: OrderStatus,
        total_cents: i64,
        placed_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            customer_id,
            lines,
            status,
            total_cents,
            placed_at,
            updated_at,
        }
    }

    /// Confirms payment, emitting `OrderPaid`. Only pending orders can pay.
    pub fn pay(&mut self) -> Result<OrderPaid, DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Order {} cannot be paid from {:?} status", self.id, self.status),
            ));
        }

        let paid_at = Timestamp::now();
        self.status = OrderStatus::Paid;
        self.updated_at = paid_at;

        Ok(OrderPaid {
            event_id: EventId::new(),
            order_id: self.id,
            amount_cents: self.total_cents,
            paid_at,
        })
    }

    /// Cancels a pending order, emitting `OrderCancelled`.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<OrderCancelled, DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Order {} cannot be cancelled from {:?} status",
                    self.id, self.status
                ),
            ));
        }

        let cancelled_at = Timestamp::now();
        self.status = OrderStatus::Cancelled;
        self.updated_at = cancelled_at;

        Ok(OrderCancelled {
            event_id: EventId::new(),
            order_id: self.id,
            reason: reason.into(),
            cancelled_at,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    pub fn placed_at(&self) -> Timestamp {
        self.placed_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}
