//! Customer command handlers.

mod register_customer;

pub use register_customer::{
    RegisterCustomerCommand, RegisterCustomerHandler, RegisterCustomerResult,
};
