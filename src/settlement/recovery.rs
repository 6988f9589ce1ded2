//! Queue Sweeper
//!
//! Background worker that returns stuck RUNNING jobs to the queue and
//! deletes expired results.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::queue::{JobQueue, QueueError};

/// Configuration for the sweeper
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often to sweep
    pub sweep_interval: Duration,
    /// How long a job may sit in RUNNING before it is presumed abandoned
    pub stale_threshold: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(300),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub requeued: usize,
    pub purged: usize,
}

pub struct QueueSweeper {
    queue: Arc<dyn JobQueue>,
    config: SweepConfig,
}

impl QueueSweeper {
    pub fn new(queue: Arc<dyn JobQueue>, config: SweepConfig) -> Self {
        Self { queue, config }
    }

    pub fn with_defaults(queue: Arc<dyn JobQueue>) -> Self {
        Self::new(queue, SweepConfig::default())
    }

    /// Run until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting queue sweeper"
        );

        loop {
            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Queue sweep failed");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.sweep_interval) => {}
            }
        }

        info!("Queue sweeper stopped");
    }

    /// Run a single requeue + purge cycle
    pub async fn sweep_once(&self) -> Result<SweepReport, QueueError> {
        let requeued = self.queue.requeue_stale(self.config.stale_threshold).await?;
        if requeued > 0 {
            warn!(count = requeued, "Requeued stale RUNNING jobs");
        }

        let purged = self.queue.purge_expired().await?;
        if purged > 0 {
            info!(count = purged, "Purged expired results");
        } else {
            debug!("No expired results");
        }

        Ok(SweepReport { requeued, purged })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{MemoryJobQueue, QueueConfig, SettlementJob, TaskStatus};

    fn job() -> SettlementJob {
        SettlementJob {
            user_id: 1,
            ticker: "AAPL".to_string(),
            transaction_type: "sell".to_string(),
            transaction_volume: 1,
        }
    }

    #[test]
    fn test_sweep_config_default() {
        let config = SweepConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.stale_threshold, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_sweep_requeues_abandoned_job() {
        let queue = Arc::new(MemoryJobQueue::new(QueueConfig::default()));
        let task_id = queue.enqueue(job()).await.unwrap();
        queue.dequeue().await.unwrap(); // claimed, then the worker "dies"

        let sweeper = QueueSweeper::new(
            queue.clone(),
            SweepConfig {
                sweep_interval: Duration::from_secs(1),
                stale_threshold: Duration::ZERO,
            },
        );
        let report = sweeper.sweep_once().await.unwrap();
        assert_eq!(report, SweepReport { requeued: 1, purged: 0 });
        assert_eq!(queue.status(task_id).await.unwrap(), Some(TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_fresh_running_job_left_alone() {
        let queue = Arc::new(MemoryJobQueue::default());
        queue.enqueue(job()).await.unwrap();
        queue.dequeue().await.unwrap();

        let sweeper = QueueSweeper::with_defaults(queue.clone());
        assert_eq!(sweeper.sweep_once().await.unwrap(), SweepReport::default());
    }
}
