//! Transaction Queue Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded (bad payload, unknown state id)
    #[error("Corrupt job record: {0}")]
    Corrupt(String),
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Unavailable(_) => "QUEUE_UNAVAILABLE",
            QueueError::Database(_) => "DATABASE_ERROR",
            QueueError::Corrupt(_) => "CORRUPT_JOB",
        }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                QueueError::Unavailable(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                QueueError::Corrupt(e.to_string())
            }
            _ => QueueError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        QueueError::Corrupt(e.to_string())
    }
}
