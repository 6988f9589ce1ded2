//! Transaction handlers
//!
//! Submission is asynchronous: the handler only validates and enqueues, the
//! settlement worker does the rest. History reads are served from the store
//! through the read cache.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, accepted, error_codes, ok};
use super::read_through;
use crate::cache::keys;
use crate::settlement::{self, SubmitTransactionRequest, SubmitTransactionResponse};
use crate::store::{TimeRange, Transaction};

/// Submit a transaction for settlement
///
/// POST /api/v1/transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = SubmitTransactionRequest,
    responses(
        (status = 202, description = "Accepted, poll the task", body = SubmitTransactionResponse, content_type = "application/json"),
        (status = 400, description = "Invalid transaction")
    ),
    tag = "Transactions"
)]
pub async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTransactionRequest>,
) -> ApiResult<SubmitTransactionResponse> {
    let resp = settlement::submit_transaction(state.queue.as_ref(), req).await?;
    accepted(resp)
}

/// Get one settled transaction (uncached)
///
/// GET /api/v1/transaction/{transaction_id}
#[utoipa::path(
    get,
    path = "/api/v1/transaction/{transaction_id}",
    params(
        ("transaction_id" = i64, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction", body = Transaction, content_type = "application/json"),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<i64>,
) -> ApiResult<Transaction> {
    match state.store.get_transaction(transaction_id).await? {
        Some(tx) => ok(tx),
        None => ApiError::not_found(error_codes::TRANSACTION_NOT_FOUND, "Transaction not found")
            .into_err(),
    }
}

/// All transactions of a user (cached)
///
/// GET /api/v1/transactions/{user_id}
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{user_id}",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Transactions ordered by timestamp", body = Vec<Transaction>, content_type = "application/json"),
        (status = 404, description = "No transactions")
    ),
    tag = "Transactions"
)]
pub async fn list_user_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<Transaction>> {
    let txs = read_through(
        state.cache.as_ref(),
        &keys::user_transactions(user_id),
        || async {
            let rows = state
                .store
                .list_transactions(user_id, None)
                .await
                .map_err(ApiError::from)?;
            Ok((!rows.is_empty()).then_some(rows))
        },
    )
    .await?;

    match txs {
        Some(txs) => ok(txs),
        None => ApiError::not_found(error_codes::TRANSACTION_NOT_FOUND, "No transactions found")
            .into_err(),
    }
}

/// Transactions of a user within `[start, end]` (cached)
///
/// GET /api/v1/transactions/{user_id}/{start}/{end}
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{user_id}/{start}/{end}",
    params(
        ("user_id" = i64, Path, description = "User ID"),
        ("start" = String, Path, description = "Range start, RFC 3339 or YYYY-MM-DD"),
        ("end" = String, Path, description = "Range end, RFC 3339 or YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Transactions in range", body = Vec<Transaction>, content_type = "application/json"),
        (status = 400, description = "Malformed or inverted range"),
        (status = 404, description = "No transactions in range")
    ),
    tag = "Transactions"
)]
pub async fn list_user_transactions_range(
    State(state): State<Arc<AppState>>,
    Path((user_id, start, end)): Path<(i64, String, String)>,
) -> ApiResult<Vec<Transaction>> {
    let range = parse_range(&start, &end)?;

    let txs = read_through(
        state.cache.as_ref(),
        &keys::user_transactions_range(user_id, &start, &end),
        || async {
            let rows = state
                .store
                .list_transactions(user_id, Some(range))
                .await
                .map_err(ApiError::from)?;
            Ok((!rows.is_empty()).then_some(rows))
        },
    )
    .await?;

    match txs {
        Some(txs) => ok(txs),
        None => ApiError::not_found(
            error_codes::TRANSACTION_NOT_FOUND,
            "No transactions found in range",
        )
        .into_err(),
    }
}

// ============================================================================
// Timestamp Parsing
// ============================================================================

fn invalid_range(msg: String) -> ApiError {
    ApiError::new(
        axum::http::StatusCode::BAD_REQUEST,
        error_codes::INVALID_TIME_RANGE,
        msg,
    )
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as UTC) or a
/// bare date (midnight UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn parse_range(start: &str, end: &str) -> Result<TimeRange, ApiError> {
    let start_ts =
        parse_timestamp(start).ok_or_else(|| invalid_range(format!("Invalid start: {}", start)))?;
    let end_ts =
        parse_timestamp(end).ok_or_else(|| invalid_range(format!("Invalid end: {}", end)))?;
    TimeRange::new(start_ts, end_ts)
        .ok_or_else(|| invalid_range(format!("start {} is after end {}", start, end)))
}
