//! Record store entities
//!
//! Rows of the `users`, `stock_snapshots` and `transactions` tables, plus the
//! write-side inputs used to create them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============================================================================
// User
// ============================================================================

/// Registered user with a cash balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub user_id: i64,
    #[schema(example = "alice")]
    pub username: String,
    /// Signed cash balance. Only settlement mutates it after registration.
    #[schema(value_type = String, example = "1000")]
    pub balance: Decimal,
}

// ============================================================================
// Stock Snapshot
// ============================================================================

/// Point-in-time price/volume record for a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StockSnapshot {
    pub id: i64,
    #[schema(example = "AAPL")]
    pub ticker: String,
    #[schema(value_type = String)]
    pub open_price: Decimal,
    #[schema(value_type = String, example = "150")]
    pub close_price: Decimal,
    #[schema(value_type = String)]
    pub high: Decimal,
    #[schema(value_type = String)]
    pub low: Decimal,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot ingestion input (id is assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct NewStockSnapshot {
    pub ticker: String,
    pub open_price: Decimal,
    pub close_price: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Transaction
// ============================================================================

/// Settled transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised transaction type string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transaction type: {0}")]
pub struct InvalidTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = InvalidTransactionType;

    /// Exact, case-sensitive match on `buy` / `sell`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(InvalidTransactionType(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = InvalidTransactionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Settled transaction row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub transaction_id: i64,
    pub user_id: i64,
    pub ticker: String,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    pub transaction_volume: i64,
    /// Snapshot close price captured at settlement time
    #[schema(value_type = String, example = "150")]
    pub transaction_price: Decimal,
    /// Assigned at settlement, not at submission
    pub timestamp: DateTime<Utc>,
}

/// One balance mutation plus the transaction row recording it.
///
/// The store applies this atomically: the balance check (for debits), the
/// balance update and the transaction insert either all happen or none do.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementEntry {
    pub user_id: i64,
    pub ticker: String,
    pub transaction_type: TransactionType,
    pub volume: i64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl SettlementEntry {
    /// `price * volume`, `None` when it does not fit in a `Decimal`
    pub fn cost(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.volume))
    }

    /// Signed balance change: negative for buys, positive for sells
    pub fn balance_delta(&self) -> Option<Decimal> {
        let cost = self.cost()?;
        Some(match self.transaction_type {
            TransactionType::Buy => -cost,
            TransactionType::Sell => cost,
        })
    }

    /// Balance after applying this entry to `balance`, `None` on overflow
    pub fn apply_to(&self, balance: Decimal) -> Option<Decimal> {
        balance.checked_add(self.balance_delta()?)
    }

    /// Buys must not take the balance below zero; sells have no floor.
    pub fn requires_funds(&self) -> bool {
        self.transaction_type == TransactionType::Buy
    }
}

// ============================================================================
// Time Range
// ============================================================================

/// Inclusive timestamp range for transaction queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Returns `None` when `start > end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}
