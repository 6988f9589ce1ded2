//! User handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::read_through;
use crate::cache::keys;
use crate::store::User;

/// User registration
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub username: String,
    /// Opening cash balance
    #[schema(value_type = String, example = "1000")]
    pub balance: Decimal,
}

/// Register a user
///
/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = User, content_type = "application/json"),
        (status = 400, description = "Invalid parameters or username already registered")
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<User> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Invalid user: {}", e)))?;

    let user = state
        .store
        .create_user(&req.username, req.balance)
        .await
        .map_err(|e| match e {
            crate::store::StoreError::Duplicate(_) => ApiError::new(
                axum::http::StatusCode::BAD_REQUEST,
                error_codes::DUPLICATE,
                "Username already registered",
            ),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.user_id, username = %user.username, "User created");
    ok(user)
}

/// Get a user by username (cached)
///
/// GET /api/v1/users/{username}
#[utoipa::path(
    get,
    path = "/api/v1/users/{username}",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "User", body = User, content_type = "application/json"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<User> {
    let user = read_through(state.cache.as_ref(), &keys::user(&username), || async {
        state
            .store
            .get_user_by_username(&username)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    match user {
        Some(user) => ok(user),
        None => ApiError::not_found(error_codes::USER_NOT_FOUND, "User not found").into_err(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::handlers::test_support::app_state;
    use axum::http::StatusCode;

    fn request(username: &str, balance: i64) -> Json<CreateUserRequest> {
        Json(CreateUserRequest {
            username: username.to_string(),
            balance: Decimal::from(balance),
        })
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let state = app_state();

        let (status, Json(resp)) = create_user(State(state.clone()), request("alice", 1000))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        let created = resp.data.unwrap();
        assert_eq!(created.balance, Decimal::from(1000));

        let (_, Json(resp)) = get_user(State(state), Path("alice".to_string())).await.unwrap();
        assert_eq!(resp.data.unwrap(), created);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_400() {
        let state = app_state();
        create_user(State(state.clone()), request("bob", 1)).await.unwrap();

        let err = create_user(State(state), request("bob", 2)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, error_codes::DUPLICATE);
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let err = create_user(State(app_state()), request("", 1)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let err = get_user(State(app_state()), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
