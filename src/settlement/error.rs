//! Settlement Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use crate::queue::FailureReason;
use crate::store::StoreError;

/// Settlement error types
///
/// Validation variants are raised at submission (HTTP 400) and again by the
/// worker as a second line of defence. Everything else is only ever reported
/// through the Result Channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    // === Validation Errors ===
    #[error("Ticker must not be empty")]
    EmptyTicker,

    #[error("Transaction volume must be greater than zero, got {0}")]
    InvalidVolume(i64),

    #[error("Invalid transaction type: {0}. Use 'buy' or 'sell'")]
    InvalidTransactionType(String),

    // === Lookup Errors ===
    #[error("Stock not found: {0}")]
    StockNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    // === Balance Errors ===
    #[error("Insufficient balance: cost {cost} exceeds available funds")]
    InsufficientBalance { cost: Decimal },

    #[error("Settlement amount overflows: {0}")]
    AmountOverflow(String),

    // === System Errors ===
    #[error("Settlement fault: {0}")]
    Fault(String),
}

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::EmptyTicker => "EMPTY_TICKER",
            other => other.reason().code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            SettlementError::EmptyTicker
            | SettlementError::InvalidVolume(_)
            | SettlementError::InvalidTransactionType(_) => 400,
            SettlementError::StockNotFound(_) | SettlementError::UserNotFound(_) => 404,
            SettlementError::InsufficientBalance { .. } | SettlementError::AmountOverflow(_) => 422,
            SettlementError::Fault(_) => 500,
        }
    }

    /// Terminal reason recorded on the job
    pub fn reason(&self) -> FailureReason {
        match self {
            SettlementError::EmptyTicker => FailureReason::StockNotFound,
            SettlementError::InvalidVolume(_) => FailureReason::InvalidVolume,
            SettlementError::InvalidTransactionType(_) => FailureReason::InvalidTransactionType,
            SettlementError::StockNotFound(_) => FailureReason::StockNotFound,
            SettlementError::UserNotFound(_) => FailureReason::UserNotFound,
            SettlementError::InsufficientBalance { .. } => FailureReason::InsufficientBalance,
            SettlementError::AmountOverflow(_) => FailureReason::AmountOverflow,
            SettlementError::Fault(_) => FailureReason::SettlementFault,
        }
    }
}

impl From<StoreError> for SettlementError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UserNotFound(user_id) => SettlementError::UserNotFound(user_id),
            StoreError::BalanceOverflow(_) => SettlementError::AmountOverflow(e.to_string()),
            other => SettlementError::Fault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SettlementError::StockNotFound("X".into()).code(), "STOCK_NOT_FOUND");
        assert_eq!(
            SettlementError::InsufficientBalance { cost: Decimal::ONE }.code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(SettlementError::Fault("db".into()).code(), "SETTLEMENT_FAULT");
        assert_eq!(SettlementError::AmountOverflow("x".into()).code(), "AMOUNT_OVERFLOW");
        assert_eq!(SettlementError::EmptyTicker.code(), "EMPTY_TICKER");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(SettlementError::InvalidVolume(0).http_status(), 400);
        assert_eq!(SettlementError::UserNotFound(1).http_status(), 404);
        assert_eq!(
            SettlementError::InsufficientBalance { cost: Decimal::ONE }.http_status(),
            422
        );
        assert_eq!(SettlementError::Fault("x".into()).http_status(), 500);
    }

    #[test]
    fn test_from_store_error() {
        assert_eq!(
            SettlementError::from(StoreError::UserNotFound(9)),
            SettlementError::UserNotFound(9)
        );
        assert!(matches!(
            SettlementError::from(StoreError::BalanceOverflow(3)),
            SettlementError::AmountOverflow(_)
        ));
        assert!(matches!(
            SettlementError::from(StoreError::Unavailable("down".into())),
            SettlementError::Fault(_)
        ));
    }
}
