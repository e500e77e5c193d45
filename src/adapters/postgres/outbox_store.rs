//! PostgreSQL implementation of the relay-side OutboxStore.
//!
//! Fetching claims rows (`claimed_by`/`claimed_until` with
//! `FOR UPDATE SKIP LOCKED`) so concurrent relay instances cannot hand out
//! the same live record; an expired claim is fair game again, and
//! broker-side deduplication on the stable message id covers the expiry
//! race. Every mark is a single auto-committed statement, so one record's
//! update cannot be lost because of another's.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::outbox::OutboxRecord;
use crate::ports::OutboxStore;

use super::map_sqlx_error;

/// Pool-backed outbox store used by the relay.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    max_attempts: i32,
    worker_id: String,
    claim_expiry: Duration,
}

impl PostgresOutboxStore {
    pub fn new(
        pool: PgPool,
        max_attempts: i32,
        worker_id: impl Into<String>,
        claim_expiry: Duration,
    ) -> Self {
        Self {
            pool,
            max_attempts,
            worker_id: worker_id.into(),
            claim_expiry,
        }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn fetch_unpublished(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError> {
        let rows = sqlx::query(
            r#"
            WITH candidates AS (
                SELECT id
                FROM outbox_records
                WHERE processed_on_utc IS NULL
                  AND attempts < $1
                  AND (claimed_until IS NULL OR claimed_until < now())
                ORDER BY occurred_on_utc ASC, id ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_records o
            SET claimed_by = $3,
                claimed_until = now() + make_interval(secs => $4)
            FROM candidates c
            WHERE o.id = c.id
            RETURNING o.id, o.type_tag, o.payload, o.occurred_on_utc,
                      o.processed_on_utc, o.attempts, o.last_error
            "#,
        )
        .bind(self.max_attempts)
        .bind(i64::from(limit))
        .bind(&self.worker_id)
        .bind(self.claim_expiry.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch unpublished outbox records", e))?;

        let mut records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        // UPDATE ... RETURNING does not preserve the CTE ordering.
        sort_fetched(&mut records);
        Ok(records)
    }

    async fn mark_processed(&self, id: Uuid, when: Timestamp) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE outbox_records
            SET processed_on_utc = $2,
                last_error = NULL,
                claimed_by = NULL,
                claimed_until = NULL
            WHERE id = $1
              AND processed_on_utc IS NULL
            "#,
        )
        .bind(id)
        .bind(when.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to mark outbox record processed", e))?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, attempts: i32) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE outbox_records
            SET last_error = $2,
                attempts = GREATEST(attempts, $3),
                claimed_by = NULL,
                claimed_until = NULL
            WHERE id = $1
              AND processed_on_utc IS NULL
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(attempts)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to mark outbox record failed", e))?;

        Ok(())
    }
}

/// Orders records by `(occurred_on_utc, id)`, the publication preference.
fn sort_fetched(records: &mut [OutboxRecord]) {
    records.sort_by(|a, b| {
        a.occurred_on_utc()
            .cmp(&b.occurred_on_utc())
            .then_with(|| a.id().cmp(&b.id()))
    });
}

fn row_to_record(row: PgRow) -> Result<OutboxRecord, DomainError> {
    let id: Uuid = get_column(&row, "id")?;
    let type_tag: String = get_column(&row, "type_tag")?;
    let payload: Vec<u8> = get_column(&row, "payload")?;
    let occurred_on_utc: DateTime<Utc> = get_column(&row, "occurred_on_utc")?;
    let processed_on_utc: Option<DateTime<Utc>> = get_column(&row, "processed_on_utc")?;
    let attempts: i32 = get_column(&row, "attempts")?;
    let last_error: Option<String> = get_column(&row, "last_error")?;

    Ok(OutboxRecord::reconstitute(
        id,
        type_tag,
        payload,
        Timestamp::from_datetime(occurred_on_utc),
        processed_on_utc.map(Timestamp::from_datetime),
        attempts,
        last_error,
    ))
}

fn get_column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::new(ErrorCode::FatalDb, format!("Failed to get {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(offset_millis: i64) -> OutboxRecord {
        let base = Timestamp::now();
        OutboxRecord::reconstitute(
            Uuid::new_v4(),
            "courier.test.event.v1".to_string(),
            vec![],
            base.plus_millis(offset_millis),
            None,
            0,
            None,
        )
    }

    #[test]
    fn sort_fetched_orders_by_occurrence() {
        let early = record_at(0);
        let late = record_at(5);
        let mut records = vec![late.clone(), early.clone()];

        sort_fetched(&mut records);

        assert_eq!(records[0].id(), early.id());
        assert_eq!(records[1].id(), late.id());
    }

    #[test]
    fn sort_fetched_breaks_ties_by_id() {
        let when = Timestamp::now();
        let a = OutboxRecord::reconstitute(
            Uuid::from_u128(1),
            "t".to_string(),
            vec![],
            when,
            None,
            0,
            None,
        );
        let b = OutboxRecord::reconstitute(
            Uuid::from_u128(2),
            "t".to_string(),
            vec![],
            when,
            None,
            0,
            None,
        );
        let mut records = vec![b.clone(), a.clone()];

        sort_fetched(&mut records);

        assert_eq!(records[0].id(), a.id());
        assert_eq!(records[1].id(), b.id());
    }
}
