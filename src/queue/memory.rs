//! In-process Transaction Queue
//!
//! FIFO of task ids plus a map of job records. Workers park on a
//! [`Notify`] while the queue is empty.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tracing::debug;

use super::job::{Delivery, FailureReason, JobRecord, JobState, SettlementJob, TaskId, TaskStatus};
use super::{JobQueue, QueueConfig, QueueError, chrono_duration};
use crate::store::Transaction;

#[derive(Default)]
struct Inner {
    pending: VecDeque<TaskId>,
    jobs: HashMap<TaskId, JobRecord>,
}

pub struct MemoryJobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    config: QueueConfig,
}

impl MemoryJobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            config,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, QueueError> {
        self.inner
            .lock()
            .map_err(|_| QueueError::Unavailable("memory queue lock poisoned".to_string()))
    }

    fn try_claim(&self) -> Result<Option<Delivery>, QueueError> {
        let mut inner = self.lock()?;

        while let Some(task_id) = inner.pending.pop_front() {
            let Some(record) = inner.jobs.get_mut(&task_id) else {
                continue; // purged
            };
            if record.state() != JobState::Pending {
                continue;
            }

            record.status = TaskStatus::Running;
            record.attempts += 1;
            record.updated_at = Utc::now();

            return Ok(Some(Delivery {
                task_id,
                job: record.job.clone(),
                attempt: record.attempts,
            }));
        }

        Ok(None)
    }

    fn finish(&self, task_id: TaskId, status: TaskStatus) -> Result<bool, QueueError> {
        let mut inner = self.lock()?;
        let Some(record) = inner.jobs.get_mut(&task_id) else {
            return Ok(false);
        };
        if record.state() != JobState::Running {
            return Ok(false);
        }

        let now = Utc::now();
        record.status = status;
        record.updated_at = now;
        record.finished_at = Some(now);
        Ok(true)
    }

    /// Snapshot of a job row, including expired ones
    pub fn record(&self, task_id: TaskId) -> Option<JobRecord> {
        self.lock().ok()?.jobs.get(&task_id).cloned()
    }

    /// Number of jobs waiting for a worker
    pub fn pending_len(&self) -> usize {
        self.lock().map(|inner| inner.pending.len()).unwrap_or(0)
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: SettlementJob) -> Result<TaskId, QueueError> {
        let task_id = TaskId::new();
        {
            let mut inner = self.lock()?;
            inner.jobs.insert(task_id, JobRecord::new(task_id, job));
            inner.pending.push_back(task_id);
        }
        self.notify.notify_one();

        Ok(task_id)
    }

    async fn dequeue(&self) -> Result<Delivery, QueueError> {
        loop {
            // Register interest before checking so an enqueue in between is not missed
            let notified = self.notify.notified();
            if let Some(delivery) = self.try_claim()? {
                return Ok(delivery);
            }
            notified.await;
        }
    }

    async fn complete(
        &self,
        task_id: TaskId,
        transaction: &Transaction,
    ) -> Result<bool, QueueError> {
        self.finish(task_id, TaskStatus::Succeeded(transaction.clone()))
    }

    async fn fail(
        &self,
        task_id: TaskId,
        reason: FailureReason,
        message: &str,
    ) -> Result<bool, QueueError> {
        self.finish(
            task_id,
            TaskStatus::Failed {
                reason,
                message: message.to_string(),
            },
        )
    }

    async fn status(&self, task_id: TaskId) -> Result<Option<TaskStatus>, QueueError> {
        let inner = self.lock()?;
        let Some(record) = inner.jobs.get(&task_id) else {
            return Ok(None);
        };

        let ttl = chrono_duration(self.config.result_ttl);
        let expired = record
            .finished_at
            .and_then(|at| at.checked_add_signed(ttl))
            .is_some_and(|expires_at| expires_at <= Utc::now());
        if expired {
            return Ok(None);
        }

        Ok(Some(record.status.clone()))
    }

    async fn requeue_stale(&self, threshold: Duration) -> Result<usize, QueueError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(chrono_duration(threshold)) else {
            return Ok(0);
        };
        let mut requeued = Vec::new();
        {
            let mut inner = self.lock()?;
            for record in inner.jobs.values_mut() {
                if record.state() == JobState::Running && record.updated_at <= cutoff {
                    record.status = TaskStatus::Pending;
                    record.updated_at = Utc::now();
                    requeued.push(record.task_id);
                }
            }
            // Oldest first, ahead of fresh work
            requeued.sort();
            for task_id in requeued.iter().rev() {
                inner.pending.push_front(*task_id);
            }
        }

        for task_id in &requeued {
            debug!(task_id = %task_id, "Requeued stale job");
            self.notify.notify_one();
        }

        Ok(requeued.len())
    }

    async fn purge_expired(&self) -> Result<usize, QueueError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(chrono_duration(self.config.result_ttl))
        else {
            return Ok(0);
        };
        let mut inner = self.lock()?;
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|_, record| record.finished_at.is_none_or(|at| at > cutoff));

        Ok(before - inner.jobs.len())
    }
}
