//! Settlement algorithm
//!
//! Turns one [`SettlementJob`] into a persisted [`Transaction`] or a failure
//! reason. The balance check, balance update and transaction insert are a
//! single [`RecordStore::commit_settlement`] call, so a failure at any point
//! leaves the store untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::error::SettlementError;
use crate::queue::SettlementJob;
use crate::store::{RecordStore, SettlementEntry, StoreError, Transaction, TransactionType};

/// Bounded retry for lock contention / serialization failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_conflict_retries: u32,
    /// Backoff before retry `n` is `base_backoff * 2^n`
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            base_backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }
}

pub struct Settler {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
}

impl Settler {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Settle one job.
    ///
    /// Checks run in a fixed order and the first failure wins: stock lookup,
    /// user lookup, volume, transaction type, then the funds check inside
    /// the locked commit.
    pub async fn settle(&self, job: &SettlementJob) -> Result<Transaction, SettlementError> {
        let snapshot = self
            .store
            .latest_snapshot(&job.ticker)
            .await?
            .ok_or_else(|| SettlementError::StockNotFound(job.ticker.clone()))?;

        let user = self
            .store
            .get_user(job.user_id)
            .await?
            .ok_or(SettlementError::UserNotFound(job.user_id))?;

        if job.transaction_volume <= 0 {
            return Err(SettlementError::InvalidVolume(job.transaction_volume));
        }

        let transaction_type: TransactionType = job
            .transaction_type
            .parse()
            .map_err(|_| SettlementError::InvalidTransactionType(job.transaction_type.clone()))?;

        let entry = SettlementEntry {
            user_id: user.user_id,
            ticker: job.ticker.clone(),
            transaction_type,
            volume: job.transaction_volume,
            price: snapshot.close_price,
            timestamp: Utc::now(),
        };
        let cost = entry.cost().ok_or_else(|| {
            SettlementError::AmountOverflow(format!("{} x {}", entry.price, entry.volume))
        })?;

        debug!(
            user_id = entry.user_id,
            ticker = %entry.ticker,
            side = %entry.transaction_type,
            price = %entry.price,
            cost = %cost,
            "Committing settlement"
        );

        self.commit_with_retry(&entry, cost).await
    }

    async fn commit_with_retry(
        &self,
        entry: &SettlementEntry,
        cost: Decimal,
    ) -> Result<Transaction, SettlementError> {
        let mut retry = 0;
        loop {
            match self.store.commit_settlement(entry).await {
                Ok(transaction) => return Ok(transaction),
                Err(StoreError::InsufficientBalance) => {
                    return Err(SettlementError::InsufficientBalance { cost });
                }
                Err(e) if e.is_retryable() && retry < self.retry.max_conflict_retries => {
                    let backoff = self.retry.backoff(retry);
                    warn!(
                        user_id = entry.user_id,
                        retry = retry + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Settlement conflict, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    retry += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
