//! Task status polling

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{ApiResult, ok};
use crate::settlement::{self, TaskStatusResponse};

/// Poll a submitted transaction
///
/// GET /api/v1/tasks/{task_id}
///
/// Status reads go straight to the queue; they are never cached.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{task_id}",
    params(
        ("task_id" = String, Path, description = "Tracking handle returned on submission")
    ),
    responses(
        (status = 200, description = "Current task status", body = TaskStatusResponse, content_type = "application/json"),
        (status = 400, description = "Malformed task id"),
        (status = 404, description = "Unknown or expired task")
    ),
    tag = "Tasks"
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<TaskStatusResponse> {
    let resp = settlement::get_task_status(state.queue.as_ref(), &task_id).await?;
    ok(resp)
}
