//! HTTP Gateway
//!
//! Thin axum layer over the record store, the job queue and the read cache.
//! All routes live under `/api/v1`; every body is an [`types::ApiResponse`].

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Assemble the full router for `state`
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // System
        .route("/health", get(handlers::health_check))
        // Users
        .route("/users", post(handlers::create_user))
        .route("/users/{username}", get(handlers::get_user))
        // Stocks
        .route(
            "/stocks",
            post(handlers::create_stock).get(handlers::list_stocks),
        )
        .route("/stocks/{ticker}", get(handlers::get_stock))
        // Transactions
        .route("/transactions", post(handlers::submit_transaction))
        .route(
            "/transaction/{transaction_id}",
            get(handlers::get_transaction),
        )
        .route(
            "/transactions/{user_id}",
            get(handlers::list_user_transactions),
        )
        .route(
            "/transactions/{user_id}/{start}/{end}",
            get(handlers::list_user_transactions_range),
        )
        // Tasks
        .route("/tasks/{task_id}", get(handlers::get_task));

    Router::new()
        .nest("/api/v1", api_routes)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Bind `host:port` and serve until `shutdown` flips to true
pub async fn run_server(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(%addr, error = %e, "Failed to bind, port may already be in use");
        e
    })?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/docs", addr);

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            tracing::info!("Gateway shutting down");
        })
        .await
}
