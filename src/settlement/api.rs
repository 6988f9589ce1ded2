//! Settlement API Layer
//!
//! Submission and status polling for settlement jobs. Submission validates
//! synchronously and returns a tracking handle without waiting on the
//! worker; settlement-time failures are only visible through polling.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::error::SettlementError;
use crate::gateway::types::{ApiError, error_codes};
use crate::queue::{JobQueue, SettlementJob, TaskId, TaskStatus};
use crate::store::{Transaction, TransactionType};

/// Status string returned at submission
pub const SUBMITTED_STATUS: &str = "Processing";

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Transaction submission
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitTransactionRequest {
    #[schema(example = 1)]
    pub user_id: i64,
    #[validate(length(min = 1))]
    #[schema(example = "AAPL")]
    pub ticker: String,
    /// `buy` or `sell`
    #[schema(example = "buy")]
    pub transaction_type: String,
    #[validate(range(min = 1))]
    #[schema(example = 5)]
    pub transaction_volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitTransactionResponse {
    /// Tracking handle (ULID)
    pub task_id: String,
    #[schema(example = "Processing")]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskError {
    #[schema(example = "INSUFFICIENT_BALANCE")]
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task_id: String,
    /// PENDING, RUNNING, SUCCEEDED or FAILED
    #[schema(example = "SUCCEEDED")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskStatusResponse {
    pub fn new(task_id: TaskId, status: TaskStatus) -> Self {
        let state = status.state().as_str().to_string();
        let (result, error) = match status {
            TaskStatus::Pending | TaskStatus::Running => (None, None),
            TaskStatus::Succeeded(transaction) => (Some(transaction), None),
            TaskStatus::Failed { reason, message } => (
                None,
                Some(TaskError {
                    code: reason.code().to_string(),
                    message,
                }),
            ),
        };

        Self {
            task_id: task_id.to_string(),
            status: state,
            result,
            error,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Validate a submission and turn it into a queue payload
pub fn validate_submission(req: &SubmitTransactionRequest) -> Result<SettlementJob, SettlementError> {
    if let Err(errors) = req.validate() {
        let fields = errors.field_errors();
        if fields.contains_key("transaction_volume") {
            return Err(SettlementError::InvalidVolume(req.transaction_volume));
        }
        return Err(SettlementError::EmptyTicker);
    }

    req.transaction_type
        .parse::<TransactionType>()
        .map_err(|_| SettlementError::InvalidTransactionType(req.transaction_type.clone()))?;

    Ok(SettlementJob {
        user_id: req.user_id,
        ticker: req.ticker.clone(),
        transaction_type: req.transaction_type.clone(),
        transaction_volume: req.transaction_volume,
    })
}

/// Map SettlementError to an API error
fn map_error(e: &SettlementError) -> ApiError {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let code = match e {
        SettlementError::EmptyTicker => error_codes::INVALID_PARAMETER,
        SettlementError::InvalidVolume(_) => error_codes::INVALID_VOLUME,
        SettlementError::InvalidTransactionType(_) => error_codes::INVALID_TRANSACTION_TYPE,
        SettlementError::StockNotFound(_) => error_codes::STOCK_NOT_FOUND,
        SettlementError::UserNotFound(_) => error_codes::USER_NOT_FOUND,
        SettlementError::InsufficientBalance { .. } => error_codes::INSUFFICIENT_BALANCE,
        SettlementError::AmountOverflow(_) => error_codes::AMOUNT_OVERFLOW,
        SettlementError::Fault(_) => error_codes::INTERNAL_ERROR,
    };

    ApiError::new(status, code, e.to_string())
}

// ============================================================================
// Operations
// ============================================================================

/// Validate and enqueue. Never waits on settlement.
pub async fn submit_transaction(
    queue: &dyn JobQueue,
    req: SubmitTransactionRequest,
) -> Result<SubmitTransactionResponse, ApiError> {
    let job = validate_submission(&req).map_err(|e| map_error(&e))?;

    let task_id = queue.enqueue(job).await?;
    tracing::info!(
        task_id = %task_id,
        user_id = req.user_id,
        ticker = %req.ticker,
        side = %req.transaction_type,
        volume = req.transaction_volume,
        "Transaction submitted"
    );

    Ok(SubmitTransactionResponse {
        task_id: task_id.to_string(),
        status: SUBMITTED_STATUS.to_string(),
    })
}

/// Poll a tracking handle
pub async fn get_task_status(
    queue: &dyn JobQueue,
    task_id: &str,
) -> Result<TaskStatusResponse, ApiError> {
    let task_id: TaskId = task_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid task id: {}", task_id)))?;

    let status = queue.status(task_id).await?.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            error_codes::TASK_NOT_FOUND,
            format!("Task not found: {}", task_id),
        )
    })?;

    Ok(TaskStatusResponse::new(task_id, status))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{FailureReason, MemoryJobQueue};

    fn request(kind: &str, volume: i64) -> SubmitTransactionRequest {
        SubmitTransactionRequest {
            user_id: 1,
            ticker: "AAPL".to_string(),
            transaction_type: kind.to_string(),
            transaction_volume: volume,
        }
    }

    #[test]
    fn test_validate_submission() {
        assert!(validate_submission(&request("buy", 5)).is_ok());
        assert!(validate_submission(&request("sell", 1)).is_ok());

        assert_eq!(
            validate_submission(&request("buy", 0)),
            Err(SettlementError::InvalidVolume(0))
        );
        assert_eq!(
            validate_submission(&request("buy", -3)),
            Err(SettlementError::InvalidVolume(-3))
        );
        assert_eq!(
            validate_submission(&request("Buy", 1)),
            Err(SettlementError::InvalidTransactionType("Buy".to_string()))
        );

        let mut empty = request("buy", 1);
        empty.ticker.clear();
        assert_eq!(validate_submission(&empty), Err(SettlementError::EmptyTicker));
    }

    #[tokio::test]
    async fn test_submit_returns_processing() {
        let queue = MemoryJobQueue::default();
        let resp = submit_transaction(&queue, request("buy", 5)).await.unwrap();
        assert_eq!(resp.status, "Processing");

        let status = get_task_status(&queue, &resp.task_id).await.unwrap();
        assert_eq!(status.status, "PENDING");
        assert!(status.result.is_none() && status.error.is_none());
    }

    #[tokio::test]
    async fn test_rejected_submission_is_not_enqueued() {
        let queue = MemoryJobQueue::default();
        let err = submit_transaction(&queue, request("hold", 5)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, error_codes::INVALID_TRANSACTION_TYPE);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_status_not_found_and_bad_id() {
        let queue = MemoryJobQueue::default();

        let err = get_task_status(&queue, &TaskId::new().to_string()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = get_task_status(&queue, "nope").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_failed_status_response() {
        let resp = TaskStatusResponse::new(
            TaskId::new(),
            TaskStatus::Failed {
                reason: FailureReason::InsufficientBalance,
                message: "Insufficient balance".to_string(),
            },
        );
        assert_eq!(resp.status, "FAILED");
        assert_eq!(resp.error.unwrap().code, "INSUFFICIENT_BALANCE");
    }
}
