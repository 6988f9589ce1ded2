//! Settlement Pipeline
//!
//! Asynchronous path from "transaction accepted" to "balance mutated and
//! transaction persisted".
//!
//! # State Machine
//!
//! ```text
//! submit → PENDING → RUNNING → SUCCEEDED
//!                       ↓
//!                    FAILED
//! ```
//!
//! # Invariants
//!
//! 1. **Atomic settlement**: the funds check, balance update and transaction
//!    insert commit together or not at all
//! 2. **Serialized balances**: settlements for one user are applied one at a
//!    time, the funds check sees every earlier debit
//! 3. **No silent retry**: FAILED is terminal; only lock conflicts are retried,
//!    inside the same attempt
//! 4. **At-least-once**: a job abandoned in RUNNING is redelivered by the
//!    sweeper

pub mod api;
pub mod error;
pub mod recovery;
pub mod settler;
pub mod worker;

pub use api::{
    SubmitTransactionRequest, SubmitTransactionResponse, TaskStatusResponse, get_task_status,
    submit_transaction,
};
pub use error::SettlementError;
pub use recovery::{QueueSweeper, SweepConfig, SweepReport};
pub use settler::{RetryPolicy, Settler};
pub use worker::{SettlementWorker, WorkerConfig, spawn_workers};
