//! Transaction Queue and Result Channel
//!
//! At-least-once work queue of [`SettlementJob`]s. The job table doubles as
//! the result store: the producer writes a PENDING row, a worker claims it
//! (RUNNING) and records the outcome (SUCCEEDED / FAILED). Pollers read the
//! row by [`TaskId`] until it expires.
//!
//! # Delivery
//!
//! - Each delivery goes to exactly one worker.
//! - A worker that dies leaves its job RUNNING. [`JobQueue::requeue_stale`]
//!   puts such jobs back to PENDING, so a job may be delivered more than once.
//! - Terminal results are hidden from [`JobQueue::status`] once older than the
//!   result TTL and physically removed by [`JobQueue::purge_expired`].

pub mod error;
pub mod job;
pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

use crate::store::Transaction;

pub use error::QueueError;
pub use job::{Delivery, FailureReason, JobRecord, JobState, SettlementJob, TaskId, TaskStatus};
pub use memory::MemoryJobQueue;
pub use postgres::PgJobQueue;

/// Queue behaviour shared by both implementations
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Idle wait between claim attempts (PostgreSQL only)
    pub poll_interval: Duration,
    /// How long finished results stay visible
    pub result_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            result_ttl: Duration::from_secs(3600),
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Record a PENDING job and return its tracking handle. Never waits on
    /// settlement.
    async fn enqueue(&self, job: SettlementJob) -> Result<TaskId, QueueError>;

    /// Claim the oldest PENDING job, moving it to RUNNING. Waits until one is
    /// available.
    async fn dequeue(&self) -> Result<Delivery, QueueError>;

    /// RUNNING → SUCCEEDED. Returns false if the job was not RUNNING.
    async fn complete(&self, task_id: TaskId, transaction: &Transaction)
    -> Result<bool, QueueError>;

    /// RUNNING → FAILED. Returns false if the job was not RUNNING.
    async fn fail(
        &self,
        task_id: TaskId,
        reason: FailureReason,
        message: &str,
    ) -> Result<bool, QueueError>;

    /// `None` for unknown or expired handles
    async fn status(&self, task_id: TaskId) -> Result<Option<TaskStatus>, QueueError>;

    /// RUNNING jobs not touched for `threshold` go back to PENDING.
    /// Returns the number of jobs requeued.
    async fn requeue_stale(&self, threshold: Duration) -> Result<usize, QueueError>;

    /// Delete terminal jobs older than the result TTL. Returns rows removed.
    async fn purge_expired(&self) -> Result<usize, QueueError>;
}

/// `std` duration as chrono, saturating on overflow
pub(crate) fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
