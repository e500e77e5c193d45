//! The outbox record entity.
//!
//! An outbox record describes one domain event awaiting publication. It is
//! inserted in the same database transaction as the domain rows it belongs
//! to, and later drained by the relay.

use uuid::Uuid;

use crate::domain::foundation::{encode_event, DomainError, EventSchema, Timestamp};

/// A row in the engine's outbox table.
///
/// State machine: created unprocessed → published (`processed_on_utc` set,
/// terminal) or retried (`attempts` grows) until quarantined at the
/// configured ceiling. `processed_on_utc` is set at most once and never
/// cleared; `attempts` never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    id: Uuid,
    type_tag: String,
    payload: Vec<u8>,
    occurred_on_utc: Timestamp,
    processed_on_utc: Option<Timestamp>,
    attempts: i32,
    last_error: Option<String>,
}

impl OutboxRecord {
    /// Creates a fresh unprocessed record.
    ///
    /// The id is assigned here, at enqueue time, and doubles as the
    /// broker-level message id so consumers can deduplicate.
    pub fn new(type_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_tag: type_tag.into(),
            payload,
            occurred_on_utc: Timestamp::now(),
            processed_on_utc: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Encodes a domain event and wraps it in a fresh record.
    pub fn for_event<E: EventSchema>(event: &E) -> Result<Self, DomainError> {
        let (type_tag, payload) = encode_event(event)?;
        Ok(Self::new(type_tag, payload))
    }

    /// Rebuilds a record from persisted state.
    pub fn reconstitute(
        id: Uuid,
        type_tag: String,
        payload: Vec<u8>,
        occurred_on_utc: Timestamp,
        processed_on_utc: Option<Timestamp>,
        attempts: i32,
        last_error: Option<String>,
    ) -> Self {
        Self {
            id,
            type_tag,
            payload,
            occurred_on_utc,
            processed_on_utc,
            attempts,
            last_error,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn occurred_on_utc(&self) -> Timestamp {
        self.occurred_on_utc
    }

    pub fn processed_on_utc(&self) -> Option<Timestamp> {
        self.processed_on_utc
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True once publication has been confirmed.
    pub fn is_processed(&self) -> bool {
        self.processed_on_utc.is_some()
    }

    /// True once the record has exhausted its attempts.
    pub fn is_quarantined(&self, max_attempts: i32) -> bool {
        !self.is_processed() && self.attempts >= max_attempts
    }

    /// Marks the record as published. Idempotent: the first timestamp wins.
    pub fn mark_processed(&mut self, when: Timestamp) {
        if self.processed_on_utc.is_none() {
            self.processed_on_utc = Some(when);
            self.last_error = None;
        }
    }

    /// Records a failed publish attempt, raising `attempts` to the given
    /// value. Attempts never decrease, so a stale caller cannot undo
    /// progress. Quarantine is this operation with the attempts ceiling.
    pub fn mark_failed(&mut self, error: impl Into<String>, attempts: i32) {
        self.attempts = self.attempts.max(attempts);
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> OutboxRecord {
        OutboxRecord::new("courier.test.event.v1", br#"{"n":1}"#.to_vec())
    }

    #[test]
    fn new_record_is_unprocessed_with_zero_attempts() {
        let record = test_record();
        assert!(!record.is_processed());
        assert_eq!(record.attempts(), 0);
        assert!(record.last_error().is_none());
        assert!(record.processed_on_utc().is_none());
    }

    #[test]
    fn records_get_unique_ids() {
        assert_ne!(test_record().id(), test_record().id());
    }

    #[test]
    fn mark_processed_is_idempotent_first_timestamp_wins() {
        let mut record = test_record();
        let t1 = Timestamp::now();
        let t2 = t1.plus_secs(60);

        record.mark_processed(t1);
        record.mark_processed(t2);

        assert_eq!(record.processed_on_utc(), Some(t1));
    }

    #[test]
    fn mark_processed_clears_last_error() {
        let mut record = test_record();
        record.mark_failed("connection reset", 1);
        record.mark_processed(Timestamp::now());

        assert!(record.last_error().is_none());
        assert_eq!(record.attempts(), 1);
    }

    #[test]
    fn mark_failed_raises_attempts_and_sets_error() {
        let mut record = test_record();
        record.mark_failed("throttled", 1);
        record.mark_failed("server busy", 2);

        assert_eq!(record.attempts(), 2);
        assert_eq!(record.last_error(), Some("server busy"));
    }

    #[test]
    fn attempts_never_decrease() {
        let mut record = test_record();
        record.mark_failed("first", 1);
        record.mark_failed("second", 2);

        record.mark_failed("stale caller", 1);
        assert_eq!(record.attempts(), 2);
    }

    #[test]
    fn quarantine_is_mark_failed_at_the_ceiling() {
        let mut record = test_record();
        record.mark_failed("no schema for tag", 5);

        assert_eq!(record.attempts(), 5);
        assert!(record.is_quarantined(5));
        assert_eq!(record.last_error(), Some("no schema for tag"));
        assert!(!record.is_processed());
    }

    #[test]
    fn processed_record_is_not_quarantined() {
        let mut record = test_record();
        record.mark_failed("once", 1);
        record.mark_processed(Timestamp::now());

        assert!(!record.is_quarantined(1));
    }

    #[test]
    fn for_event_encodes_payload() {
        use crate::domain::foundation::{domain_event, EventId, Timestamp};
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct TestNoted {
            event_id: EventId,
            note_id: String,
            occurred_at: Timestamp,
        }

        domain_event!(
            TestNoted,
            type_tag = "courier.test.noted.v1",
            aggregate_id = note_id,
            occurred_at = occurred_at,
            event_id = event_id
        );

        let event = TestNoted {
            event_id: EventId::new(),
            note_id: "n-1".to_string(),
            occurred_at: Timestamp::now(),
        };

        let record = OutboxRecord::for_event(&event).unwrap();
        assert_eq!(record.type_tag(), "courier.test.noted.v1");
        let round_trip: TestNoted = serde_json::from_slice(record.payload()).unwrap();
        assert_eq!(round_trip, event);
    }
}
