//! Customer aggregate.
//!
//! Deliberately small: the customer exists to give commands something to
//! persist alongside outbox records.

use crate::domain::foundation::{CustomerId, DomainError, EventId, Timestamp};

use super::CustomerRegistered;

/// A registered customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    id: CustomerId,
    name: String,
    email: String,
    registered_at: Timestamp,
}

impl Customer {
    /// Registers a new customer, emitting `CustomerRegistered`.
    pub fn register(
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<(Self, CustomerRegistered), DomainError> {
        let name = name.into();
        let email = email.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "Customer name cannot be empty"));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(DomainError::validation(
                "email",
                "Customer email must be a valid address",
            ));
        }

        let customer = Self {
            id: CustomerId::new(),
            name,
            email,
            registered_at: Timestamp::now(),
        };

        let event = CustomerRegistered {
            event_id: EventId::new(),
            customer_id: customer.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
            registered_at: customer.registered_at,
        };

        Ok((customer, event))
    }

    /// Rebuilds a customer from persisted state.
    pub fn reconstitute(
        id: CustomerId,
        name: String,
        email: String,
        registered_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            email,
            registered_at,
        }
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn register_creates_customer_and_event() {
        let (customer, event) = Customer::register("Ada", "ada@example.com").unwrap();

        assert_eq!(customer.name(), "Ada");
        assert_eq!(event.customer_id, customer.id());
        assert_eq!(event.registered_at, customer.registered_at());
    }

    #[test]
    fn register_rejects_empty_name() {
        let err = Customer::register("  ", "ada@example.com").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn register_rejects_invalid_email() {
        assert!(Customer::register("Ada", "").is_err());
        assert!(Customer::register("Ada", "not-an-email").is_err());
    }
}
