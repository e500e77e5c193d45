//! Order domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, CustomerId, EventId, OrderId, Timestamp};

use super::OrderLine;

/// Published when a new order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// ID of the placed order.
    pub order_id: OrderId,

    /// Customer who placed the order.
    pub customer_id: CustomerId,

    /// Ordered lines.
    pub lines: Vec<OrderLine>,

    /// Order total in cents.
    pub total_cents: i64,

    /// When the order was placed.
    pub placed_at: Timestamp,
}

domain_event!(
    OrderPlaced,
    type_tag = "courier.order.placed.v1",
    aggregate_id = order_id,
    occurred_at = placed_at,
    event_id = event_id
);

/// Published when an order is paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaid {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// ID of the paid order.
    pub order_id: OrderId,

    /// Amount captured, in cents.
    pub amount_cents: i64,

    /// When payment was confirmed.
    pub paid_at: Timestamp,
}

domain_event!(
    OrderPaid,
    type_tag = "courier.order.paid.v1",
    aggregate_id = order_id,
    occurred_at = paid_at,
    event_id = event_id
);

/// Published when a pending order is cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// ID of the cancelled order.
    pub order_id: OrderId,

    /// Caller-supplied cancellation reason.
    pub reason: String,

    /// When the cancellation occurred.
    pub cancelled_at: Timestamp,
}

domain_event!(
    OrderCancelled,
    type_tag = "courier.order.cancelled.v1",
    aggregate_id = order_id,
    occurred_at = cancelled_at,
    event_id = event_id
);
