//! Error types shared across the engine.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,

    // Domain rule errors
    DomainRule,
    InvalidStateTransition,
    CustomerNotFound,
    OrderNotFound,

    // Unit-of-work state errors
    TransactionAlreadyActive,
    TransactionNotActive,

    // Database errors
    TransientDb,
    FatalDb,

    // Broker errors
    TransientBroker,
    PermanentBroker,

    // Event codec errors
    UnknownEventType,
    MalformedPayload,

    // Lifecycle errors
    Cancelled,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::DomainRule => "DOMAIN_RULE",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::TransactionAlreadyActive => "TRANSACTION_ALREADY_ACTIVE",
            ErrorCode::TransactionNotActive => "TRANSACTION_NOT_ACTIVE",
            ErrorCode::TransientDb => "TRANSIENT_DB",
            ErrorCode::FatalDb => "FATAL_DB",
            ErrorCode::TransientBroker => "TRANSIENT_BROKER",
            ErrorCode::PermanentBroker => "PERMANENT_BROKER",
            ErrorCode::UnknownEventType => "UNKNOWN_EVENT_TYPE",
            ErrorCode::MalformedPayload => "MALFORMED_PAYLOAD",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field)
    }

    /// Creates a cancellation error.
    pub fn cancelled(operation: &str) -> Self {
        Self::new(
            ErrorCode::Cancelled,
            format!("Operation cancelled: {}", operation),
        )
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// True for database faults worth retrying before commit.
    pub fn is_transient_db(&self) -> bool {
        self.code == ErrorCode::TransientDb
    }

    /// True for broker faults that resolve on a later relay cycle.
    ///
    /// Cancellation of an in-flight publish counts: the record stays
    /// unprocessed and is retried after restart.
    pub fn is_transient_broker(&self) -> bool {
        matches!(self.code, ErrorCode::TransientBroker | ErrorCode::Cancelled)
    }

    /// True for decode failures that quarantine a record immediately.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::UnknownEventType | ErrorCode::MalformedPayload
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}
