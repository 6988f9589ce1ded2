//! stocksettle - Stock Transaction Settlement Service
//!
//! Users hold a cash balance, stock snapshots carry prices, and buy/sell
//! requests are settled asynchronously against the latest close price.
//!
//! # Modules
//!
//! - [`store`] - Record Store: users, snapshots, transactions (PostgreSQL or in-memory)
//! - [`queue`] - At-least-once settlement job queue and result channel
//! - [`settlement`] - Settler, worker pool and stale-job sweeper
//! - [`cache`] - TTL read cache for entity lookups
//! - [`gateway`] - axum HTTP API under `/api/v1`
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

pub mod cache;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod queue;
pub mod settlement;
pub mod store;

// Convenient re-exports at crate root
pub use queue::{JobQueue, TaskId, TaskStatus};
pub use settlement::{SettlementError, Settler};
pub use store::{RecordStore, StockSnapshot, Transaction, TransactionType, User};
