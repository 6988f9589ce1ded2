//! Schema bootstrap
//!
//! Idempotent `CREATE ... IF NOT EXISTS` statements, run once at startup.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id   BIGSERIAL PRIMARY KEY,
        username  TEXT NOT NULL UNIQUE,
        balance   NUMERIC NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_snapshots (
        id           BIGSERIAL PRIMARY KEY,
        ticker       TEXT NOT NULL,
        open_price   NUMERIC NOT NULL,
        close_price  NUMERIC NOT NULL,
        high         NUMERIC NOT NULL,
        low          NUMERIC NOT NULL,
        volume       BIGINT NOT NULL,
        timestamp    TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_stock_snapshots_ticker_ts ON stock_snapshots (ticker, timestamp DESC, id DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        transaction_id      BIGSERIAL PRIMARY KEY,
        user_id             BIGINT NOT NULL REFERENCES users (user_id),
        ticker              TEXT NOT NULL,
        transaction_type    TEXT NOT NULL CHECK (transaction_type IN ('buy', 'sell')),
        transaction_volume  BIGINT NOT NULL CHECK (transaction_volume > 0),
        transaction_price   NUMERIC NOT NULL,
        timestamp           TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_ts ON transactions (user_id, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS settlement_jobs (
        task_id        TEXT PRIMARY KEY,
        payload        TEXT NOT NULL,
        state          SMALLINT NOT NULL,
        attempts       INTEGER NOT NULL DEFAULT 0,
        failure_code   TEXT,
        error_message  TEXT,
        result         TEXT,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        finished_at    TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_settlement_jobs_state_created ON settlement_jobs (state, created_at)",
];

/// Create all tables and indexes if missing
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "Database schema ready");
    Ok(())
}
