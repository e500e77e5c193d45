//! Customer domain events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, CustomerId, EventId, Timestamp};

/// Published when a new customer is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// ID of the registered customer.
    pub customer_id: CustomerId,

    /// Customer display name.
    pub name: String,

    /// Contact email address.
    pub email: String,

    /// When the registration occurred.
    pub registered_at: Timestamp,
}

domain_event!(
    CustomerRegistered,
    type_tag = "courier.customer.registered.v1",
    aggregate_id = customer_id,
    occurred_at = registered_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::DomainEvent;

    #[test]
    fn registered_event_exposes_tag_and_aggregate() {
        let event = CustomerRegistered {
            event_id: EventId::new(),
            customer_id: CustomerId::new(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            registered_at: Timestamp::now(),
        };

        assert_eq!(event.type_tag(), "courier.customer.registered.v1");
        assert_eq!(event.aggregate_id(), event.customer_id.to_string());
    }
}
