//! Order sample aggregate.

mod aggregate;
mod events;

pub use aggregate::{Order, OrderLine, OrderStatus};
pub use events::{OrderCancelled, OrderPaid, OrderPlaced};
