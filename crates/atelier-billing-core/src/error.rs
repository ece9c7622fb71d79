//! Error types for atelier-billing.

use crate::ids::IdError;

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in billing operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Insufficient credits for the operation.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current total balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account ID that was not found.
        account_id: String,
    },

    /// Duplicate external event (idempotency).
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// The external event ID that was duplicated.
        event_id: String,
    },

    /// Amount must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// External service error (payment processor, generation provider).
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
