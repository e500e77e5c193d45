//! Order command handlers.

mod cancel_order;
mod pay_order;
mod place_order;

pub use cancel_order::{CancelOrderCommand, CancelOrderHandler, CancelOrderResult};
pub use pay_order::{PayOrderCommand, PayOrderHandler, PayOrderResult};
pub use place_order::{PlaceOrderCommand, PlaceOrderHandler, PlaceOrderResult};
