//! In-memory implementation of the UnitOfWork port for testing.
//!
//! Mirrors the Postgres adapter's protocol: writes are staged in order and
//! become visible in the shared database only on commit; rollback discards
//! them. No retry machinery is needed because nothing here can fail
//! transiently.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::customer::Customer;
use crate::domain::foundation::{
    Cancellation, CustomerId, DomainError, ErrorCode, OrderId,
};
use crate::domain::order::Order;
use crate::domain::outbox::OutboxRecord;
use crate::ports::{
    CustomerRepository, OrderRepository, OutboxWriter, UnitOfWork, UnitOfWorkFactory,
};

use super::InMemoryDatabase;

enum MemWrite {
    InsertCustomer(Customer),
    InsertOrder(Order),
    UpdateOrder(Order),
    InsertOutbox(OutboxRecord),
}

struct MemUowState {
    active: bool,
    staged: Vec<MemWrite>,
}

type SharedState = Arc<Mutex<MemUowState>>;

/// In-memory unit of work for testing.
pub struct InMemoryUnitOfWork {
    db: InMemoryDatabase,
    state: SharedState,
    customers: Arc<MemCustomerRepository>,
    orders: Arc<MemOrderRepository>,
    outbox: Arc<MemOutboxWriter>,
}

impl InMemoryUnitOfWork {
    pub fn new(db: InMemoryDatabase) -> Self {
        let state: SharedState = Arc::new(Mutex::new(MemUowState {
            active: false,
            staged: Vec::new(),
        }));

        Self {
            customers: Arc::new(MemCustomerRepository {
                db: db.clone(),
                state: state.clone(),
            }),
            orders: Arc::new(MemOrderRepository {
                db: db.clone(),
                state: state.clone(),
            }),
            outbox: Arc::new(MemOutboxWriter {
                state: state.clone(),
            }),
            db,
            state,
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
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
        let mut state = self.state.lock().await;
        if state.active {
            return Err(DomainError::new(
                ErrorCode::TransactionAlreadyActive,
                "A transaction is already active on this unit of work",
            ));
        }
        state.active = true;
        state.staged.clear();
        Ok(())
    }

    async fn save(&self, cancel: &Cancellation) -> Result<(), DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::cancelled("unit-of-work save"));
        }
        let state = self.state.lock().await;
        if !state.active {
            return Err(DomainError::new(
                ErrorCode::TransactionNotActive,
                "No active transaction to save",
            ));
        }
        // Staged writes stay buffered until commit; visibility rules match
        // the real adapter.
        Ok(())
    }

    async fn commit(&self) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if !state.active {
            return Err(DomainError::new(
                ErrorCode::TransactionNotActive,
                "No active transaction to commit",
            ));
        }

        let staged = std::mem::take(&mut state.staged);
        state.active = false;
        drop(state);

        // One write lock for the whole batch keeps the commit atomic.
        let mut db = self.db.state.write().await;
        for write in staged {
            match write {
                MemWrite::InsertCustomer(customer) => {
                    db.customers.insert(customer.id(), customer);
                }
                MemWrite::InsertOrder(order) | MemWrite::UpdateOrder(order) => {
                    db.orders.insert(order.id(), order);
                }
                MemWrite::InsertOutbox(record) => {
                    db.outbox.push(record);
                }
            }
        }
        Ok(())
    }

    async fn rollback(&self) {
        let mut state = self.state.lock().await;
        state.active = false;
        state.staged.clear();
    }
}

/// Factory handing out in-memory units of work over a shared database.
#[derive(Clone)]
pub struct InMemoryUnitOfWorkFactory {
    db: InMemoryDatabase,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }
}

impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    fn create(&self) -> Arc<dyn UnitOfWork> {
        Arc::new(InMemoryUnitOfWork::new(self.db.clone()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transaction-scoped repositories
// ════════════════════════════════════════════════════════════════════════════

struct MemCustomerRepository {
    db: InMemoryDatabase,
    state: SharedState,
}

#[async_trait]
impl CustomerRepository for MemCustomerRepository {
    async fn insert(&self, customer: &Customer) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        require_active(&state)?;
        state.staged.push(MemWrite::InsertCustomer(customer.clone()));
        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, DomainError> {
        require_active(&*self.state.lock().await)?;
        Ok(self.db.state.read().await.customers.get(&id).cloned())
    }
}

struct MemOrderRepository {
    db: InMemoryDatabase,
    state: SharedState,
}

#[async_trait]
impl OrderRepository for MemOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        require_active(&state)?;
        state.staged.push(MemWrite::InsertOrder(order.clone()));
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        require_active(&state)?;
        state.staged.push(MemWrite::UpdateOrder(order.clone()));
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, DomainError> {
        require_active(&*self.state.lock().await)?;
        Ok(self.db.state.read().await.orders.get(&id).cloned())
    }
}

struct MemOutboxWriter {
    state: SharedState,
}

#[async_trait]
impl OutboxWriter for MemOutboxWriter {
    async fn insert(&self, record: &OutboxRecord) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        require_active(&state)?;
        state.staged.push(MemWrite::InsertOutbox(record.clone()));
        Ok(())
    }
}

fn require_active(state: &MemUowState) -> Result<(), DomainError> {
    if !state.active {
        return Err(DomainError::new(
            ErrorCode::TransactionNotActive,
            "Repository used outside an active transaction",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_invisible_until_commit() {
        let db = InMemoryDatabase::new();
        let uow = InMemoryUnitOfWork::new(db.clone());
        let (customer, _) = Customer::register("Ada", "ada@example.com").unwrap();

        uow.begin().await.unwrap();
        uow.customers().insert(&customer).await.unwrap();
        uow.save(&Cancellation::none()).await.unwrap();
        assert_eq!(db.customer_count().await, 0);

        uow.commit().await.unwrap();
        assert_eq!(db.customer_count().await, 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let db = InMemoryDatabase::new();
        let uow = InMemoryUnitOfWork::new(db.clone());
        let (customer, _) = Customer::register("Ada", "ada@example.com").unwrap();

        uow.begin().await.unwrap();
        uow.customers().insert(&customer).await.unwrap();
        uow.rollback().await;

        assert_eq!(db.customer_count().await, 0);
    }

    #[tokio::test]
    async fn begin_twice_is_already_active() {
        let uow = InMemoryUnitOfWork::new(InMemoryDatabase::new());
        uow.begin().await.unwrap();

        let err = uow.begin().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionAlreadyActive);
    }

    #[tokio::test]
    async fn commit_without_begin_is_not_active() {
        let uow = InMemoryUnitOfWork::new(InMemoryDatabase::new());
        let err = uow.commit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionNotActive);
    }

    #[tokio::test]
    async fn handle_is_reusable_after_commit() {
        let db = InMemoryDatabase::new();
        let uow = InMemoryUnitOfWork::new(db.clone());

        uow.begin().await.unwrap();
        uow.commit().await.unwrap();

        // Commit closes the transaction; a new one may begin.
        uow.begin().await.unwrap();
        uow.rollback().await;
    }

    #[tokio::test]
    async fn cancelled_save_fails() {
        let uow = InMemoryUnitOfWork::new(InMemoryDatabase::new());
        uow.begin().await.unwrap();

        let (tx, cancel) = Cancellation::channel();
        tx.send(true).unwrap();

        let err = uow.save(&cancel).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Cancelled);
    }
}
