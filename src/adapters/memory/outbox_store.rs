//! In-memory implementation of the relay-side OutboxStore for testing.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::outbox::OutboxRecord;
use crate::ports::OutboxStore;

use super::InMemoryDatabase;

/// In-memory outbox store over the shared database.
#[derive(Clone)]
pub struct InMemoryOutboxStore {
    db: InMemoryDatabase,
    max_attempts: i32,
}

impl InMemoryOutboxStore {
    pub fn new(db: InMemoryDatabase, max_attempts: i32) -> Self {
        Self { db, max_attempts }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn fetch_unpublished(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError> {
        let state = self.db.state.read().await;
        let mut candidates: Vec<OutboxRecord> = state
            .outbox
            .iter()
            .filter(|r| !r.is_processed() && r.attempts() < self.max_attempts)
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            a.occurred_on_utc()
                .cmp(&b.occurred_on_utc())
                .then_with(|| a.id().cmp(&b.id()))
        });
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn mark_processed(&self, id: Uuid, when: Timestamp) -> Result<(), DomainError> {
        let mut state = self.db.state.write().await;
        if let Some(record) = state.outbox.iter_mut().find(|r| r.id() == id) {
            record.mark_processed(when);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, attempts: i32) -> Result<(), DomainError> {
        let mut state = self.db.state.write().await;
        if let Some(record) = state.outbox.iter_mut().find(|r| r.id() == id) {
            if !record.is_processed() {
                record.mark_failed(error, attempts);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OutboxRecord {
        OutboxRecord::new("courier.test.event.v1", br#"{"n":1}"#.to_vec())
    }

    #[tokio::test]
    async fn fetch_skips_processed_and_quarantined_records() {
        let db = InMemoryDatabase::new();
        let store = InMemoryOutboxStore::new(db.clone(), 3);

        let fresh = record();
        let mut processed = record();
        processed.mark_processed(Timestamp::now());
        let mut quarantined = record();
        quarantined.mark_failed("decode failure", 3);

        db.seed_outbox_record(fresh.clone()).await;
        db.seed_outbox_record(processed).await;
        db.seed_outbox_record(quarantined).await;

        let batch = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id(), fresh.id());
    }

    #[tokio::test]
    async fn fetch_respects_limit_and_occurrence_order() {
        let db = InMemoryDatabase::new();
        let store = InMemoryOutboxStore::new(db.clone(), 3);

        let base = Timestamp::now();
        let at = |offset: i64| {
            OutboxRecord::reconstitute(
                uuid::Uuid::new_v4(),
                "courier.test.event.v1".to_string(),
                vec![],
                base.plus_millis(offset),
                None,
                0,
                None,
            )
        };

        let oldest = at(0);
        let middle = at(5);
        let newest = at(10);
        // Seed newest-first to prove ordering comes from the timestamps.
        db.seed_outbox_record(newest).await;
        db.seed_outbox_record(oldest.clone()).await;
        db.seed_outbox_record(middle.clone()).await;

        let batch = store.fetch_unpublished(2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id(), oldest.id());
        assert_eq!(batch[1].id(), middle.id());
    }

    #[tokio::test]
    async fn mark_processed_is_idempotent() {
        let db = InMemoryDatabase::new();
        let store = InMemoryOutboxStore::new(db.clone(), 3);
        let seeded = record();
        let id = seeded.id();
        db.seed_outbox_record(seeded).await;

        let t1 = Timestamp::now();
        let t2 = t1.plus_secs(60);
        store.mark_processed(id, t1).await.unwrap();
        store.mark_processed(id, t2).await.unwrap();

        let stored = db.outbox_record(id).await.unwrap();
        assert_eq!(stored.processed_on_utc(), Some(t1));
    }

    #[tokio::test]
    async fn mark_failed_keeps_attempts_monotonic() {
        let db = InMemoryDatabase::new();
        let store = InMemoryOutboxStore::new(db.clone(), 5);
        let seeded = record();
        let id = seeded.id();
        db.seed_outbox_record(seeded).await;

        store.mark_failed(id, "busy", 2).await.unwrap();
        store.mark_failed(id, "stale", 1).await.unwrap();

        let stored = db.outbox_record(id).await.unwrap();
        assert_eq!(stored.attempts(), 2);
        assert_eq!(stored.last_error(), Some("stale"));
    }
}
