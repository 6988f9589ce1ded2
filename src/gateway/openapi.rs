//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::handlers::{CreateStockRequest, CreateUserRequest, HealthResponse};
use crate::settlement::api::TaskError;
use crate::settlement::{SubmitTransactionRequest, SubmitTransactionResponse, TaskStatusResponse};
use crate::store::{StockSnapshot, Transaction, TransactionType, User};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Settlement API",
        version = "1.0.0",
        description = "Asynchronous stock transaction settlement: submit, poll, query.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::users::create_user,
        crate::gateway::handlers::users::get_user,
        crate::gateway::handlers::stocks::create_stock,
        crate::gateway::handlers::stocks::list_stocks,
        crate::gateway::handlers::stocks::get_stock,
        crate::gateway::handlers::transactions::submit_transaction,
        crate::gateway::handlers::transactions::get_transaction,
        crate::gateway::handlers::transactions::list_user_transactions,
        crate::gateway::handlers::transactions::list_user_transactions_range,
        crate::gateway::handlers::tasks::get_task,
    ),
    components(
        schemas(
            HealthResponse,
            CreateUserRequest,
            User,
            CreateStockRequest,
            StockSnapshot,
            SubmitTransactionRequest,
            SubmitTransactionResponse,
            TaskStatusResponse,
            TaskError,
            Transaction,
            TransactionType,
        )
    ),
    tags(
        (name = "Users", description = "User registration and lookup"),
        (name = "Stocks", description = "Price snapshots"),
        (name = "Transactions", description = "Submission and settled history"),
        (name = "Tasks", description = "Settlement status polling"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
