//! PostgreSQL implementation of the UnitOfWork port.
//!
//! Repositories issued by this unit of work stage their writes in an
//! ordered log; `save` flushes the log into the open transaction. A
//! transient flush failure aborts the transaction, so the retry starts a
//! fresh one and replays the whole log — safe because nothing has been
//! committed yet. Reads run against the live transaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::customer::Customer;
use crate::domain::foundation::{
    Cancellation, CustomerId, DomainError, ErrorCode, OrderId, Timestamp,
};
use crate::domain::order::{Order, OrderLine, OrderStatus};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{
    CustomerRepository, OrderRepository, OutboxWriter, UnitOfWork, UnitOfWorkFactory,
};

use super::map_sqlx_error;

/// Bounded retry policy for transient save failures.
#[derive(Debug, Clone)]
pub struct SaveRetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base backoff; the nth retry waits `base * 2^n`.
    pub base_delay: Duration,
}

impl SaveRetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Shrinks the backoff base, for tests.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for SaveRetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// One staged write, replayable against any transaction.
#[derive(Debug, Clone)]
enum StagedWrite {
    InsertCustomer(CustomerRow),
    InsertOrder(OrderRow),
    UpdateOrder(OrderRow),
    InsertOutbox(OutboxRow),
}

impl StagedWrite {
    async fn execute(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        match self {
            StagedWrite::InsertCustomer(row) => {
                sqlx::query(
                    r#"
                    INSERT INTO customers (id, name, email, registered_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(row.id)
                .bind(&row.name)
                .bind(&row.email)
                .bind(row.registered_at)
                .execute(conn)
                .await?;
            }
            StagedWrite::InsertOrder(row) => {
                sqlx::query(
                    r#"
                    INSERT INTO orders (
                        id, customer_id, lines, status, total_cents, placed_at, updated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(row.id)
                .bind(row.customer_id)
                .bind(&row.lines)
                .bind(row.status)
                .bind(row.total_cents)
                .bind(row.placed_at)
                .bind(row.updated_at)
                .execute(conn)
                .await?;
            }
            StagedWrite::UpdateOrder(row) => {
                sqlx::query(
                    r#"
                    UPDATE orders SET
                        lines = $2,
                        status = $3,
                        total_cents = $4,
                        updated_at = $5
                    WHERE id = $1
                    "#,
                )
                .bind(row.id)
                .bind(&row.lines)
                .bind(row.status)
                .bind(row.total_cents)
                .bind(row.updated_at)
                .execute(conn)
                .await?;
            }
            StagedWrite::InsertOutbox(row) => {
                sqlx::query(
                    r#"
                    INSERT INTO outbox_records (
                        id, type_tag, payload, occurred_on_utc,
                        processed_on_utc, attempts, last_error
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(row.id)
                .bind(&row.type_tag)
                .bind(&row.payload)
                .bind(row.occurred_on_utc)
                .bind(row.processed_on_utc)
                .bind(row.attempts)
                .bind(&row.last_error)
                .execute(conn)
                .await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    lines: serde_json::Value,
    status: &'static str,
    total_cents: i64,
    placed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct OutboxRow {
    id: Uuid,
    type_tag: String,
    payload: Vec<u8>,
    occurred_on_utc: DateTime<Utc>,
    processed_on_utc: Option<DateTime<Utc>>,
    attempts: i32,
    last_error: Option<String>,
}

/// Shared transactional state: the open transaction plus the write log.
struct UowInner {
    tx: Option<Transaction<'static, Postgres>>,
    log: Vec<StagedWrite>,
    flushed: usize,
}

type SharedInner = Arc<Mutex<UowInner>>;

/// PostgreSQL unit of work.
pub struct PostgresUnitOfWork {
    pool: PgPool,
    inner: SharedInner,
    retry: SaveRetryPolicy,
    customers: Arc<TxCustomerRepository>,
    orders: Arc<TxOrderRepository>,
    outbox: Arc<TxOutboxWriter>,
}

impl PostgresUnitOfWork {
    pub fn new(pool: PgPool, retry: SaveRetryPolicy) -> Self {
        let inner: SharedInner = Arc::new(Mutex::new(UowInner {
            tx: None,
            log: Vec::new(),
            flushed: 0,
        }));

        Self {
            pool,
            retry,
            customers: Arc::new(TxCustomerRepository {
                inner: inner.clone(),
            }),
            orders: Arc::new(TxOrderRepository {
                inner: inner.clone(),
            }),
            outbox: Arc::new(TxOutboxWriter {
                inner: inner.clone(),
            }),
            inner,
        }
    }

    /// Flushes unexecuted staged writes into the open transaction,
    /// retrying transient faults by replaying the whole log in a fresh
    /// transaction.
    async fn flush_locked(
        &self,
        inner: &mut UowInner,
        cancel: &Cancellation,
    ) -> Result<(), DomainError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DomainError::cancelled("unit-of-work save"));
            }
            if inner.tx.is_none() {
                return Err(DomainError::new(
                    ErrorCode::TransactionNotActive,
                    "No active transaction to save",
                ));
            }

            match Self::execute_pending(inner).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient_db() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %err,
                        "Transient save failure, replaying staged writes in a fresh transaction"
                    );

                    // The aborted transaction loses everything flushed so
                    // far; replay the full log from the start.
                    if let Some(tx) = inner.tx.take() {
                        if let Err(rollback_err) = tx.rollback().await {
                            tracing::warn!(error = %rollback_err, "Rollback of aborted transaction failed");
                        }
                    }
                    inner.flushed = 0;

                    tokio::time::sleep(self.retry.delay(attempt)).await;

                    let tx = self
                        .pool
                        .begin()
                        .await
                        .map_err(|e| map_sqlx_error("Failed to restart transaction", e))?;
                    inner.tx = Some(tx);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn execute_pending(inner: &mut UowInner) -> Result<(), DomainError> {
        let UowInner { tx, log, flushed } = inner;
        let tx = tx.as_mut().expect("caller checked tx presence");

        while *flushed < log.len() {
            log[*flushed]
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to flush staged write", e))?;
            *flushed += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    fn customers(&self) -> Arc<dyn CustomerRepository> {
        self.customers.clone()
    }

    fn orders(&self) -> Arc<dyn OrderRepository> {
        self.orders.clone()
    }

    fn outbox(&self) -> Arc<dyn OutboxWriter> {
        self.outbox.clone()
    }

    async fn begin(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        if inner.tx.is_some() {
            return Err(DomainError::new(
                ErrorCode::TransactionAlreadyActive,
                "A transaction is already active on this unit of work",
            ));
        }

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;

        inner.tx = Some(tx);
        inner.log.clear();
        inner.flushed = 0;
        Ok(())
    }

    async fn save(&self, cancel: &Cancellation) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        if inner.tx.is_none() {
            return Err(DomainError::new(
                ErrorCode::TransactionNotActive,
                "No active transaction to save",
            ));
        }
        self.flush_locked(&mut inner, cancel).await
    }

    async fn commit(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        if inner.tx.is_none() {
            return Err(DomainError::new(
                ErrorCode::TransactionNotActive,
                "No active transaction to commit",
            ));
        }

        self.flush_locked(&mut inner, &Cancellation::none()).await?;

        let tx = inner.tx.take().expect("flush keeps the transaction open");
        let result = tx.commit().await;
        inner.log.clear();
        inner.flushed = 0;

        result.map_err(|e| {
            // Dropping the failed transaction is the implicit rollback.
            let err = map_sqlx_error("Failed to commit transaction", e);
            tracing::warn!(error = %err, "Commit failed, transaction abandoned");
            err
        })
    }

    async fn rollback(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(tx) = inner.tx.take() {
            if let Err(err) = tx.rollback().await {
                tracing::warn!(error = %err, "Rollback failed");
            }
        }
        inner.log.clear();
        inner.flushed = 0;
    }
}

/// Factory producing one `PostgresUnitOfWork` per command execution.
#[derive(Clone)]
pub struct PostgresUnitOfWorkFactory {
    pool: PgPool,
    retry: SaveRetryPolicy,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool, retry: SaveRetryPolicy) -> Self {
        Self { pool, retry }
    }
}

impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    fn create(&self) -> Arc<dyn UnitOfWork> {
        Arc::new(PostgresUnitOfWork::new(
            self.pool.clone(),
            self.retry.clone(),
        ))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transaction-scoped repositories
// ════════════════════════════════════════════════════════════════════════════

struct TxCustomerRepository {
    inner: SharedInner,
}

#[async_trait]
impl CustomerRepository for TxCustomerRepository {
    async fn insert(&self, customer: &Customer) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        require_tx(&inner)?;
        inner
            .log
            .push(StagedWrite::InsertCustomer(customer_to_row(customer)));
        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        let mut inner = self.inner.lock().await;
        let tx = active_tx(&mut inner)?;

        let row = sqlx::query(
            r#"
            SELECT id, name, email, registered_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch customer", e))?;

        row.map(row_to_customer).transpose()
    }
}

struct TxOrderRepository {
    inner: SharedInner,
}

#[async_trait]
impl OrderRepository for TxOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        require_tx(&inner)?;
        let row = order_to_row(order)?;
        inner.log.push(StagedWrite::InsertOrder(row));
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        require_tx(&inner)?;
        let row = order_to_row(order)?;
        inner.log.push(StagedWrite::UpdateOrder(row));
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        let mut inner = self.inner.lock().await;
        let tx = active_tx(&mut inner)?;

        let row = sqlx::query(
            r#"
            SELECT id, customer_id, lines, status, total_cents, placed_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch order", e))?;

        row.map(row_to_order).transpose()
    }
}

struct TxOutboxWriter {
    inner: SharedInner,
}

#[async_trait]
impl OutboxWriter for TxOutboxWriter {
    async fn insert(&self, record: &OutboxRecord) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        require_tx(&inner)?;
        inner
            .log
            .push(StagedWrite::InsertOutbox(outbox_to_row(record)));
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn require_tx(inner: &UowInner) -> Result<(), DomainError> {
    if inner.tx.is_none() {
        return Err(DomainError::new(
            ErrorCode::TransactionNotActive,
            "Repository used outside an active transaction",
        ));
    }
    Ok(())
}

fn active_tx(inner: &mut UowInner) -> Result<&mut Transaction<'static, Postgres>, DomainError> {
    inner.tx.as_mut().ok_or_else(|| {
        DomainError::new(
            ErrorCode::TransactionNotActive,
            "Repository used outside an active transaction",
        )
    })
}

fn customer_to_row(customer: &Customer) -> CustomerRow {
    CustomerRow {
        id: *customer.id().as_uuid(),
        name: customer.name().to_string(),
        email: customer.email().to_string(),
        registered_at: *customer.registered_at().as_datetime(),
    }
}

fn row_to_customer(row: PgRow) -> Result<Customer, DomainError> {
    let id: Uuid = get_column(&row, "id")?;
    let name: String = get_column(&row, "name")?;
    let email: String = get_column(&row, "email")?;
    let registered_at: DateTime<Utc> = get_column(&row, "registered_at")?;

    Ok(Customer::reconstitute(
        CustomerId::from_uuid(id),
        name,
        email,
        Timestamp::from_datetime(registered_at),
    ))
}

fn order_to_row(order: &Order) -> Result<OrderRow, DomainError> {
    let lines = serde_json::to_value(order.lines()).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Failed to serialize order lines: {}", e),
        )
    })?;

    Ok(OrderRow {
        id: *order.id().as_uuid(),
        customer_id: *order.customer_id().as_uuid(),
        lines,
        status: order_status_to_str(order.status()),
        total_cents: order.total_cents(),
        placed_at: *order.placed_at().as_datetime(),
        updated_at: *order.updated_at().as_datetime(),
    })
}

fn row_to_order(row: PgRow) -> Result<Order, DomainError> {
    let id: Uuid = get_column(&row, "id")?;
    let customer_id: Uuid = get_column(&row, "customer_id")?;
    let lines_value: serde_json::Value = get_column(&row, "lines")?;
    let status_str: String = get_column(&row, "status")?;
    let total_cents: i64 = get_column(&row, "total_cents")?;
    let placed_at: DateTime<Utc> = get_column(&row, "placed_at")?;
    let updated_at: DateTime<Utc> = get_column(&row, "updated_at")?;

    let lines: Vec<OrderLine> = serde_json::from_value(lines_value).map_err(|e| {
        DomainError::new(
            ErrorCode::FatalDb,
            format!("Invalid order lines payload: {}", e),
        )
    })?;

    Ok(Order::reconstitute(
        OrderId::from_uuid(id),
        CustomerId::from_uuid(customer_id),
        lines,
        str_to_order_status(&status_str)?,
        total_cents,
        Timestamp::from_datetime(placed_at),
        Timestamp::from_datetime(updated_at),
    ))
}

fn outbox_to_row(record: &OutboxRecord) -> OutboxRow {
    OutboxRow {
        id: record.id(),
        type_tag: record.type_tag().to_string(),
        payload: record.payload().to_vec(),
        occurred_on_utc: *record.occurred_on_utc().as_datetime(),
        processed_on_utc: record.processed_on_utc().map(|t| *t.as_datetime()),
        attempts: record.attempts(),
        last_error: record.last_error().map(str::to_string),
    }
}

fn order_status_to_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Paid => "paid",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn str_to_order_status(s: &str) -> Result<OrderStatus, DomainError> {
    match s {
        "pending" => Ok(OrderStatus::Pending),
        "paid" => Ok(OrderStatus::Paid),
        "cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(DomainError::new(
            ErrorCode::FatalDb,
            format!("Invalid order status: {}", s),
        )),
    }
}

fn get_column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::new(ErrorCode::FatalDb, format!("Failed to get {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://courier@localhost/courier")
            .unwrap()
    }

    #[test]
    fn order_status_conversion_roundtrips() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Cancelled] {
            assert_eq!(
                str_to_order_status(order_status_to_str(status)).unwrap(),
                status
            );
        }
    }

    #[test]
    fn str_to_order_status_rejects_invalid() {
        assert!(str_to_order_status("shipped").is_err());
    }

    #[test]
    fn order_row_serializes_lines_as_json() {
        let (order, _) =
            Order::place(CustomerId::new(), vec![OrderLine::new("sku-1", 2, 500)]).unwrap();
        let row = order_to_row(&order).unwrap();

        assert_eq!(row.status, "pending");
        assert_eq!(row.total_cents, 1000);
        assert_eq!(row.lines[0]["sku"], "sku-1");
    }

    #[test]
    fn retry_policy_backoff_doubles() {
        let policy = SaveRetryPolicy::new(3).with_base_delay(Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn save_without_begin_is_not_active() {
        let uow = PostgresUnitOfWork::new(lazy_pool(), SaveRetryPolicy::default());
        let err = uow.save(&Cancellation::none()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionNotActive);
    }

    #[tokio::test]
    async fn commit_without_begin_is_not_active() {
        let uow = PostgresUnitOfWork::new(lazy_pool(), SaveRetryPolicy::default());
        let err = uow.commit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionNotActive);
    }

    #[tokio::test]
    async fn repositories_require_an_active_transaction() {
        let uow = PostgresUnitOfWork::new(lazy_pool(), SaveRetryPolicy::default());
        let (customer, _) = Customer::register("Ada", "ada@example.com").unwrap();

        let err = uow.customers().insert(&customer).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionNotActive);
    }

    #[tokio::test]
    async fn rollback_without_begin_is_a_no_op() {
        let uow = PostgresUnitOfWork::new(lazy_pool(), SaveRetryPolicy::default());
        uow.rollback().await;
    }
}
