//! stocksettle - Stock Transaction Settlement Service
//!
//! ```text
//! ┌──────────┐  enqueue  ┌──────────┐  claim   ┌──────────┐  commit  ┌──────────┐
//! │ Gateway  │──────────▶│  Queue   │─────────▶│ Workers  │─────────▶│  Store   │
//! │ (axum)   │◀──poll────│ (jobs)   │◀─result──│ (N tasks)│          │ (PG/mem) │
//! └──────────┘           └──────────┘          └──────────┘          └──────────┘
//! ```
//!
//! Flags:
//! - `--env/-e <name>`: load `config/<name>.yaml` (default `dev`)
//! - `--port <port>`: override `gateway.port`
//! - `--gateway-only`: serve HTTP, run no workers
//! - `--worker-only`: run workers and the sweeper, no HTTP
//!
//! The split modes need `postgres_url`: the in-process queue is not shared
//! between processes.

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use stocksettle::cache::InProcessCache;
use stocksettle::config::AppConfig;
use stocksettle::db::{Database, schema};
use stocksettle::gateway::{self, state::AppState};
use stocksettle::queue::{JobQueue, MemoryJobQueue, PgJobQueue};
use stocksettle::settlement::{QueueSweeper, Settler, spawn_workers};
use stocksettle::store::{MemoryRecordStore, PgRecordStore, RecordStore};

// ============================================================
// CLI
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_gateway_only() -> bool {
    std::env::args().any(|a| a == "--gateway-only")
}

fn use_worker_only() -> bool {
    std::env::args().any(|a| a == "--worker-only")
}

// ============================================================
// WIRING
// ============================================================

async fn build_backends(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn RecordStore>, Arc<dyn JobQueue>)> {
    let queue_config = config.worker.queue_config();

    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            schema::init_schema(db.pool())
                .await
                .context("Failed to initialize schema")?;
            tracing::info!("Using PostgreSQL store and queue");

            let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(db.pool().clone()));
            let queue: Arc<dyn JobQueue> =
                Arc::new(PgJobQueue::new(db.pool().clone(), queue_config));
            Ok((store, queue))
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-process store and queue");
            let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
            let queue: Arc<dyn JobQueue> = Arc::new(MemoryJobQueue::new(queue_config));
            Ok((store, queue))
        }
    }
}

async fn wait_for_ctrl_c(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown.send(true);
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = stocksettle::logging::init_logging(&config);

    let gateway_only = use_gateway_only();
    let worker_only = use_worker_only();
    if gateway_only && worker_only {
        bail!("--gateway-only and --worker-only are mutually exclusive");
    }
    if (gateway_only || worker_only) && config.postgres_url.is_none() {
        bail!("--gateway-only / --worker-only require postgres_url");
    }

    tracing::info!(
        env = %env,
        version = env!("GIT_HASH"),
        gateway = !worker_only,
        workers = !gateway_only,
        "Starting stocksettle"
    );

    let (store, queue) = build_backends(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if !gateway_only {
        let settler = Arc::new(Settler::new(store.clone(), config.worker.retry_policy()));
        tasks.extend(spawn_workers(
            &config.worker.worker_config(),
            queue.clone(),
            settler,
            shutdown_rx.clone(),
        ));

        let sweeper = QueueSweeper::new(queue.clone(), config.worker.sweep_config());
        let sweeper_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            sweeper.run(sweeper_shutdown).await
        }));
        tracing::info!(
            concurrency = config.worker.concurrency,
            "Settlement workers started"
        );
    }

    let ctrl_c = tokio::spawn(wait_for_ctrl_c(shutdown_tx));

    if worker_only {
        let mut shutdown = shutdown_rx.clone();
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    } else {
        let cache = Arc::new(InProcessCache::new(
            config.cache.max_entries,
            std::time::Duration::from_secs(config.cache.entity_ttl_secs),
        ));
        let state = Arc::new(AppState::new(store, queue, cache));
        gateway::run_server(
            &config.gateway.host,
            config.gateway.port,
            state,
            shutdown_rx.clone(),
        )
        .await
        .context("Gateway server error")?;
    }

    ctrl_c.abort();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    tracing::info!("Stopped");
    Ok(())
}
