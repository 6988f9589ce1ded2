//! In-memory Record Store
//!
//! Single-process stand-in for PostgreSQL. Every operation runs under one
//! mutex, which gives `commit_settlement` the same all-or-nothing, one-at-a-time
//! behaviour the row lock gives the PostgreSQL store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::StoreError;
use super::models::{NewStockSnapshot, SettlementEntry, StockSnapshot, TimeRange, Transaction, User};
use super::RecordStore;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    username_index: HashMap<String, usize>,
    snapshots: Vec<StockSnapshot>,
    transactions: Vec<Transaction>,
}

impl Tables {
    fn user_mut(&mut self, user_id: i64) -> Option<&mut User> {
        // ids are 1-based positions; users are never deleted
        usize::try_from(user_id - 1)
            .ok()
            .and_then(|idx| self.users.get_mut(idx))
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_user(&self, username: &str, balance: Decimal) -> Result<User, StoreError> {
        let mut t = self.lock()?;
        if t.username_index.contains_key(username) {
            return Err(StoreError::Duplicate(format!("username {username}")));
        }

        let user = User {
            user_id: t.users.len() as i64 + 1,
            username: username.to_string(),
            balance,
        };
        let idx = t.users.len();
        t.users.push(user.clone());
        t.username_index.insert(username.to_string(), idx);

        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let mut t = self.lock()?;
        Ok(t.user_mut(user_id).map(|u| u.clone()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.lock()?;
        Ok(t.username_index
            .get(username)
            .and_then(|&idx| t.users.get(idx))
            .cloned())
    }

    async fn insert_snapshot(&self, s: NewStockSnapshot) -> Result<StockSnapshot, StoreError> {
        let mut t = self.lock()?;
        let snapshot = StockSnapshot {
            id: t.snapshots.len() as i64 + 1,
            ticker: s.ticker,
            open_price: s.open_price,
            close_price: s.close_price,
            high: s.high,
            low: s.low,
            volume: s.volume,
            timestamp: s.timestamp,
        };
        t.snapshots.push(snapshot.clone());

        Ok(snapshot)
    }

    async fn list_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        Ok(self.lock()?.snapshots.clone())
    }

    async fn latest_snapshot(&self, ticker: &str) -> Result<Option<StockSnapshot>, StoreError> {
        let t = self.lock()?;
        Ok(t.snapshots
            .iter()
            .filter(|s| s.ticker == ticker)
            .max_by_key(|s| (s.timestamp, s.id))
            .cloned())
    }

    async fn get_transaction(&self, transaction_id: i64) -> Result<Option<Transaction>, StoreError> {
        let t = self.lock()?;
        Ok(t.transactions
            .iter()
            .find(|tx| tx.transaction_id == transaction_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        user_id: i64,
        range: Option<TimeRange>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let t = self.lock()?;
        let mut rows: Vec<Transaction> = t
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .filter(|tx| range.is_none_or(|r| r.contains(tx.timestamp)))
            .cloned()
            .collect();
        rows.sort_by_key(|tx| (tx.timestamp, tx.transaction_id));

        Ok(rows)
    }

    async fn commit_settlement(&self, entry: &SettlementEntry) -> Result<Transaction, StoreError> {
        let mut t = self.lock()?;
        let next_id = t.transactions.len() as i64 + 1;

        let user = t
            .user_mut(entry.user_id)
            .ok_or(StoreError::UserNotFound(entry.user_id))?;

        // Checked before mutating so a failure leaves the tables untouched
        let new_balance = entry
            .apply_to(user.balance)
            .ok_or(StoreError::BalanceOverflow(entry.user_id))?;
        if entry.requires_funds() && new_balance < Decimal::ZERO {
            return Err(StoreError::InsufficientBalance);
        }
        user.balance = new_balance;

        let transaction = Transaction {
            transaction_id: next_id,
            user_id: entry.user_id,
            ticker: entry.ticker.clone(),
            transaction_type: entry.transaction_type,
            transaction_volume: entry.volume,
            transaction_price: entry.price,
            timestamp: entry.timestamp,
        };
        t.transactions.push(transaction.clone());

        Ok(transaction)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
