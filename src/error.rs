//! Structured error handling for the warden core.
//!
//! One crate-level error enum covers storage, locking, configuration and
//! supervision failures. The circuit breaker has its own generic error type
//! ([`crate::resilience::CircuitBreakerError`]) so wrapped-operation errors
//! survive untranslated.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock on '{key}' unavailable after {waited:?}")]
    LockUnavailable { key: String, waited: Duration },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Supervision error: {0}")]
    Supervision(String),
}

impl From<sqlx::Error> for WardenError {
    fn from(err: sqlx::Error) -> Self {
        WardenError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
