//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError` / `ApiResult<T>`: handler error plumbing
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CacheError;
use crate::queue::QueueError;
use crate::store::StoreError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Handler Results
// ============================================================================

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 with `data`
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// 202 with `data`: work accepted, result available later
pub fn accepted<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(data))))
}

/// Error returned by handlers, rendered as `ApiResponse<()>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn not_found(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = self.code, msg = %self.msg, "Request failed");
        }
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, error_codes::DUPLICATE, e.to_string())
            }
            StoreError::UserNotFound(_) => ApiError::not_found(error_codes::USER_NOT_FOUND, e.to_string()),
            StoreError::InsufficientBalance => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                error_codes::INSUFFICIENT_BALANCE,
                e.to_string(),
            ),
            StoreError::BalanceOverflow(_) => ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                error_codes::AMOUNT_OVERFLOW,
                e.to_string(),
            ),
            StoreError::Unavailable(_) => ApiError::service_unavailable(e.to_string()),
            StoreError::Conflict(_) | StoreError::Database(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Unavailable(_) => ApiError::service_unavailable(e.to_string()),
            QueueError::Database(_) | QueueError::Corrupt(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::CACHE_ERROR,
            e.to_string(),
        )
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const INVALID_VOLUME: i32 = 1003;
    pub const INVALID_TRANSACTION_TYPE: i32 = 1004;
    pub const INVALID_TIME_RANGE: i32 = 1005;
    pub const DUPLICATE: i32 = 1006;
    pub const AMOUNT_OVERFLOW: i32 = 1007;

    // Resource errors (4xxx)
    pub const USER_NOT_FOUND: i32 = 4001;
    pub const STOCK_NOT_FOUND: i32 = 4002;
    pub const TRANSACTION_NOT_FOUND: i32 = 4003;
    pub const TASK_NOT_FOUND: i32 = 4004;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const CACHE_ERROR: i32 = 5002;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json, serde_json::json!({"code": 0, "msg": "ok", "data": 42}));
    }

    #[test]
    fn test_error_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error(4001, "User not found")).unwrap();
        assert_eq!(json, serde_json::json!({"code": 4001, "msg": "User not found"}));
    }

    #[test]
    fn test_store_error_mapping() {
        let err = ApiError::from(StoreError::Duplicate("username alice".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, error_codes::DUPLICATE);

        let err = ApiError::from(StoreError::Unavailable("pool timed out".into()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_cache_error_is_500() {
        let err = ApiError::from(CacheError::Unavailable("down".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, error_codes::CACHE_ERROR);
    }
}
