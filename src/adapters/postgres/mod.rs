//! PostgreSQL adapters.
//!
//! - `PostgresUnitOfWork` - staged-write transaction scope for the enqueue path
//! - `PostgresOutboxStore` - relay-side fetch/mark over the outbox table

mod outbox_store;
mod unit_of_work;

pub use outbox_store::PostgresOutboxStore;
pub use unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkFactory, SaveRetryPolicy};

use crate::domain::foundation::{DomainError, ErrorCode};

/// Maps a sqlx error onto the engine's taxonomy.
///
/// Transient faults are a closed enumeration: connection loss (class 08 /
/// io), serialization failure (40001), deadlock (40P01), resource
/// exhaustion (class 53) and statement cancellation/timeout (57014).
/// Everything else is fatal.
pub(crate) fn map_sqlx_error(context: &str, error: sqlx::Error) -> DomainError {
    let code = if is_transient(&error) {
        ErrorCode::TransientDb
    } else {
        ErrorCode::FatalDb
    };
    DomainError::new(code, format!("{}: {}", context, error))
}

fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => {
                let code = code.as_ref();
                code.starts_with("08")      // connection exceptions
                    || code == "40001"      // serialization_failure
                    || code == "40P01"      // deadlock_detected
                    || code.starts_with("53") // insufficient resources / busy
                    || code == "57014"      // query_canceled (timeout)
            }
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_errors_are_transient() {
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(map_sqlx_error("save", err).code, ErrorCode::TransientDb);
    }

    #[test]
    fn pool_exhaustion_is_transient() {
        assert_eq!(
            map_sqlx_error("begin", sqlx::Error::PoolTimedOut).code,
            ErrorCode::TransientDb
        );
    }

    #[test]
    fn row_not_found_is_fatal() {
        assert_eq!(
            map_sqlx_error("fetch", sqlx::Error::RowNotFound).code,
            ErrorCode::FatalDb
        );
    }

    #[test]
    fn error_message_carries_context() {
        let err = map_sqlx_error("insert order", sqlx::Error::PoolClosed);
        assert!(err.message.starts_with("insert order:"));
    }
}
