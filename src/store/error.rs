//! Record Store Error Types

use thiserror::Error;

/// Record store errors
///
/// `Conflict` is the only retryable variant: it means the unit of work lost a
/// lock or serialization race and nothing was persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Balance overflow for user {0}")]
    BalanceOverflow(i64),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// SQLSTATE codes that mean "lost a race, try again"
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(code) if RETRYABLE_SQLSTATES.contains(&code) => {
                    StoreError::Conflict(e.to_string())
                }
                Some(UNIQUE_VIOLATION) => StoreError::Duplicate(e.to_string()),
                _ => StoreError::Database(e.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}
