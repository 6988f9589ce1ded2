//! Record Store
//!
//! Durable storage for users, stock snapshots and settled transactions.
//!
//! Two implementations share the [`RecordStore`] trait:
//! - [`PgRecordStore`]: PostgreSQL via sqlx (production)
//! - [`MemoryRecordStore`]: single-process, in-memory (dev mode and tests)
//!
//! # Balance Serialization
//!
//! [`RecordStore::commit_settlement`] is the only balance mutator. It holds a
//! per-user lock across check → update → insert, so concurrent settlements
//! against one user are applied one at a time.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use models::{
    NewStockSnapshot, SettlementEntry, StockSnapshot, TimeRange, Transaction, TransactionType,
    User,
};
pub use postgres::PgRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Register a user. Fails with `Duplicate` if the username is taken.
    async fn create_user(&self, username: &str, balance: rust_decimal::Decimal)
    -> Result<User, StoreError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn insert_snapshot(&self, snapshot: NewStockSnapshot)
    -> Result<StockSnapshot, StoreError>;

    async fn list_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError>;

    /// Most recent snapshot for `ticker` by timestamp (ties: highest id)
    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<StockSnapshot>, StoreError>;

    async fn get_transaction(&self, transaction_id: i64)
    -> Result<Option<Transaction>, StoreError>;

    /// Transactions for a user ordered by timestamp, optionally bounded
    /// (inclusive on both ends)
    async fn list_transactions(
        &self,
        user_id: i64,
        range: Option<TimeRange>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Apply a settlement atomically.
    ///
    /// Under the user's lock: verify the user exists (`UserNotFound`), verify
    /// funds for debits (`InsufficientBalance`), update the balance
    /// (`BalanceOverflow` if it no longer fits), insert the transaction row.
    /// On any error nothing is persisted.
    async fn commit_settlement(&self, entry: &SettlementEntry) -> Result<Transaction, StoreError>;

    /// Cheap liveness check
    async fn ping(&self) -> Result<(), StoreError>;
}
