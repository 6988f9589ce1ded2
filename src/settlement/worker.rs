//! Settlement Worker
//!
//! Pulls jobs off the queue, runs the [`Settler`] and records the outcome.
//! Any number of workers (tasks or processes) may share one queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::settler::Settler;
use crate::queue::{Delivery, JobQueue, JobState};

/// Pause after a queue error before trying again
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker tasks in this process
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

pub struct SettlementWorker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    settler: Arc<Settler>,
}

impl SettlementWorker {
    pub fn new(id: usize, queue: Arc<dyn JobQueue>, settler: Arc<Settler>) -> Self {
        Self { id, queue, settler }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = self.id, "Starting settlement worker");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delivery = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                delivery = self.queue.dequeue() => delivery,
            };

            match delivery {
                Ok(delivery) => {
                    self.process(delivery).await;
                }
                Err(e) => {
                    error!(worker_id = self.id, error = %e, "Dequeue failed");
                    tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
                }
            }
        }

        info!(worker_id = self.id, "Settlement worker stopped");
    }

    /// Settle one delivery and write its terminal state. Returns the state
    /// the job was moved to.
    pub async fn process(&self, delivery: Delivery) -> JobState {
        let Delivery {
            task_id,
            job,
            attempt,
        } = delivery;

        if attempt > 1 {
            warn!(task_id = %task_id, attempt, "Redelivered job");
        }

        let (state, recorded) = match self.settler.settle(&job).await {
            Ok(transaction) => {
                info!(
                    worker_id = self.id,
                    task_id = %task_id,
                    transaction_id = transaction.transaction_id,
                    user_id = transaction.user_id,
                    ticker = %transaction.ticker,
                    side = %transaction.transaction_type,
                    price = %transaction.transaction_price,
                    volume = transaction.transaction_volume,
                    "Settlement succeeded"
                );
                (
                    JobState::Succeeded,
                    self.queue.complete(task_id, &transaction).await,
                )
            }
            Err(e) => {
                let reason = e.reason();
                info!(
                    worker_id = self.id,
                    task_id = %task_id,
                    user_id = job.user_id,
                    ticker = %job.ticker,
                    reason = %reason,
                    error = %e,
                    "Settlement failed"
                );
                (
                    JobState::Failed,
                    self.queue.fail(task_id, reason, &e.to_string()).await,
                )
            }
        };

        match recorded {
            Ok(true) => {}
            Ok(false) => warn!(
                task_id = %task_id,
                state = %state,
                "Job no longer RUNNING, outcome not recorded"
            ),
            Err(e) => error!(
                task_id = %task_id,
                state = %state,
                error = %e,
                "Failed to record settlement outcome"
            ),
        }

        state
    }
}

/// Spawn `config.concurrency` workers sharing one queue
pub fn spawn_workers(
    config: &WorkerConfig,
    queue: Arc<dyn JobQueue>,
    settler: Arc<Settler>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..config.concurrency.max(1))
        .map(|id| {
            let worker = SettlementWorker::new(id, queue.clone(), settler.clone());
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run(shutdown).await })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{FailureReason, MemoryJobQueue, SettlementJob, TaskStatus};
    use crate::settlement::settler::RetryPolicy;
    use crate::store::{MemoryRecordStore, NewStockSnapshot, RecordStore};
    use chrono::Utc;
    use rust_decimal::Decimal;

    async fn setup() -> (Arc<MemoryJobQueue>, Arc<MemoryRecordStore>, SettlementWorker) {
        let store = Arc::new(MemoryRecordStore::new());
        store.create_user("alice", Decimal::from(100)).await.unwrap();
        store
            .insert_snapshot(NewStockSnapshot {
                ticker: "MSFT".to_string(),
                open_price: Decimal::from(40),
                close_price: Decimal::from(40),
                high: Decimal::from(41),
                low: Decimal::from(39),
                volume: 10,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        let queue = Arc::new(MemoryJobQueue::default());
        let settler = Arc::new(Settler::new(store.clone(), RetryPolicy::default()));
        let worker = SettlementWorker::new(0, queue.clone(), settler);
        (queue, store, worker)
    }

    fn job(kind: &str, volume: i64) -> SettlementJob {
        SettlementJob {
            user_id: 1,
            ticker: "MSFT".to_string(),
            transaction_type: kind.to_string(),
            transaction_volume: volume,
        }
    }

    #[test]
    fn test_worker_config_default() {
        assert_eq!(WorkerConfig::default().concurrency, 4);
    }

    #[tokio::test]
    async fn test_process_success_and_failure() {
        let (queue, store, worker) = setup().await;

        let ok_id = queue.enqueue(job("buy", 2)).await.unwrap();
        let fail_id = queue.enqueue(job("buy", 2)).await.unwrap();

        let delivery = queue.dequeue().await.unwrap();
        assert_eq!(worker.process(delivery).await, JobState::Succeeded);
        assert_eq!(store.get_user(1).await.unwrap().unwrap().balance, Decimal::from(20));

        let delivery = queue.dequeue().await.unwrap();
        assert_eq!(worker.process(delivery).await, JobState::Failed);

        assert!(matches!(
            queue.status(ok_id).await.unwrap(),
            Some(TaskStatus::Succeeded(_))
        ));
        match queue.status(fail_id).await.unwrap() {
            Some(TaskStatus::Failed { reason, .. }) => {
                assert_eq!(reason, FailureReason::InsufficientBalance)
            }
            other => panic!("expected FAILED, got {:?}", other),
        }
        assert_eq!(store.get_user(1).await.unwrap().unwrap().balance, Decimal::from(20));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (queue, _store, worker) = setup().await;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { worker.run(rx).await });
        let task_id = queue.enqueue(job("sell", 1)).await.unwrap();

        // Wait for the worker to pick it up
        for _ in 0..100 {
            if queue.status(task_id).await.unwrap().is_some_and(|s| s.state().is_terminal()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(
            queue.status(task_id).await.unwrap(),
            Some(TaskStatus::Succeeded(_))
        ));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
