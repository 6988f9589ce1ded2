//! Settlement job types
//!
//! State IDs are stored as SMALLINT in `settlement_jobs.state`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Transaction;

// ============================================================================
// Task ID
// ============================================================================

/// Opaque tracking handle returned at submission (ULID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(ulid::Ulid);

impl TaskId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

// ============================================================================
// Job State
// ============================================================================

/// Settlement job FSM
///
/// ```text
/// PENDING → RUNNING → SUCCEEDED
///              ↓
///            FAILED
/// ```
///
/// A RUNNING job whose worker died is returned to PENDING by the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum JobState {
    /// Enqueued, waiting for a worker
    Pending = 0,
    /// Claimed by a worker
    Running = 10,
    /// Terminal: transaction persisted, balance updated
    Succeeded = 40,
    /// Terminal: nothing persisted
    Failed = -10,
}

impl JobState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(JobState::Pending),
            10 => Some(JobState::Running),
            40 => Some(JobState::Succeeded),
            -10 => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Failure Reason
// ============================================================================

/// Why a job ended in FAILED. Persisted as its code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    StockNotFound,
    UserNotFound,
    InsufficientBalance,
    /// `price * volume` or the resulting balance does not fit in a decimal
    AmountOverflow,
    InvalidTransactionType,
    InvalidVolume,
    /// Infrastructure error during settlement; the unit of work was rolled back
    SettlementFault,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::StockNotFound => "STOCK_NOT_FOUND",
            FailureReason::UserNotFound => "USER_NOT_FOUND",
            FailureReason::InsufficientBalance => "INSUFFICIENT_BALANCE",
            FailureReason::AmountOverflow => "AMOUNT_OVERFLOW",
            FailureReason::InvalidTransactionType => "INVALID_TRANSACTION_TYPE",
            FailureReason::InvalidVolume => "INVALID_VOLUME",
            FailureReason::SettlementFault => "SETTLEMENT_FAULT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "STOCK_NOT_FOUND" => Some(FailureReason::StockNotFound),
            "USER_NOT_FOUND" => Some(FailureReason::UserNotFound),
            "INSUFFICIENT_BALANCE" => Some(FailureReason::InsufficientBalance),
            "AMOUNT_OVERFLOW" => Some(FailureReason::AmountOverflow),
            "INVALID_TRANSACTION_TYPE" => Some(FailureReason::InvalidTransactionType),
            "INVALID_VOLUME" => Some(FailureReason::InvalidVolume),
            "SETTLEMENT_FAULT" => Some(FailureReason::SettlementFault),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Payload / Status
// ============================================================================

/// Queue payload.
///
/// `transaction_type` stays a raw string: the worker re-validates it rather
/// than trusting whoever enqueued the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementJob {
    pub user_id: i64,
    pub ticker: String,
    pub transaction_type: String,
    pub transaction_volume: i64,
}

/// One delivery of a job to a worker
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub task_id: TaskId,
    pub job: SettlementJob,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: i32,
}

/// What a poller sees for a tracking handle
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded(Transaction),
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl TaskStatus {
    pub fn state(&self) -> JobState {
        match self {
            TaskStatus::Pending => JobState::Pending,
            TaskStatus::Running => JobState::Running,
            TaskStatus::Succeeded(_) => JobState::Succeeded,
            TaskStatus::Failed { .. } => JobState::Failed,
        }
    }
}

/// Full Result Channel row
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub task_id: TaskId,
    pub job: SettlementJob,
    pub status: TaskStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(task_id: TaskId, job: SettlementJob) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            job,
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.status.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
    }

    #[test]
    fn test_state_id_roundtrip() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_id(state.id()), Some(state));
        }
        assert!(JobState::from_id(20).is_none());
    }

    #[test]
    fn test_failure_reason_codes() {
        let all = [
            FailureReason::StockNotFound,
            FailureReason::UserNotFound,
            FailureReason::InsufficientBalance,
            FailureReason::AmountOverflow,
            FailureReason::InvalidTransactionType,
            FailureReason::InvalidVolume,
            FailureReason::SettlementFault,
        ];
        for reason in all {
            assert_eq!(FailureReason::from_code(reason.code()), Some(reason));
        }
        assert!(FailureReason::from_code("insufficient_balance").is_none());
    }

    #[test]
    fn test_task_id_parse() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = JobRecord::new(
            TaskId::new(),
            SettlementJob {
                user_id: 1,
                ticker: "AAPL".to_string(),
                transaction_type: "buy".to_string(),
                transaction_volume: 5,
            },
        );
        assert_eq!(record.state(), JobState::Pending);
        assert_eq!(record.attempts, 0);
        assert!(record.finished_at.is_none());
    }
}
