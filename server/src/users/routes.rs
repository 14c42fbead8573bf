//! HTTP route handlers for user and permission management

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    routing::{get, post, put},
};
use std::sync::Arc;

use super::store::UserStore;
use super::types::{User, UserError, UserInput};
use crate::error::{ErrorResponse, MessageResponse};

/// Application state for user routes
#[derive(Clone)]
pub struct UserAppState {
    pub store: Arc<UserStore>,
}

impl From<UserError> for ErrorResponse {
    fn from(e: UserError) -> Self {
        match &e {
            UserError::Validation(_) => ErrorResponse::bad_request("validation", e.to_string()),
            UserError::NotInDirectory(_) => {
                ErrorResponse::bad_request("not_in_directory", e.to_string())
            }
            UserError::AlreadyExists(_) => {
                ErrorResponse::new(StatusCode::CONFLICT, "already_exists", e.to_string())
            }
            UserError::NotFound(_) => ErrorResponse::not_found(e.to_string()),
            UserError::Directory(_) => ErrorResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "directory_unavailable",
                "User directory unavailable",
            ),
            UserError::Store(_) => ErrorResponse::store_error(),
        }
    }
}

/// GET /users - All users with their permissions
pub async fn list_users(
    State(state): State<UserAppState>,
) -> Result<Json<Vec<User>>, ErrorResponse> {
    let users = state.store.list().await.map_err(|e| {
        tracing::error!("Failed to list users: {}", e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(users))
}

/// GET /users/permissions/:username - Permission names of one user
pub async fn get_user_permissions(
    State(state): State<UserAppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<String>>, ErrorResponse> {
    let Path(username) = path?;
    let permissions = state.store.permissions_for(&username).await.map_err(|e| {
        tracing::error!("Failed to load permissions for {}: {}", username, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(permissions))
}

/// POST /users/adduser - Add a directory user with permissions
pub async fn add_user(
    State(state): State<UserAppState>,
    payload: Result<Json<UserInput>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ErrorResponse> {
    let Json(input) = payload?;
    let user = state.store.add(&input).await.map_err(|e| {
        tracing::warn!("Failed to add user {:?}: {}", input.username, e);
        ErrorResponse::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/:id - Replace a user's permissions
pub async fn update_user(
    State(state): State<UserAppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UserInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let Json(input) = payload?;
    state
        .store
        .update_permissions(id, &input.permissions)
        .await
        .map_err(|e| {
            tracing::warn!("Failed to update user {}: {}", id, e);
            ErrorResponse::from(e)
        })?;

    Ok(Json(MessageResponse::new("User updated").with_id(id)))
}

/// DELETE /users/:id
pub async fn delete_user(
    State(state): State<UserAppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let deleted = state.store.delete(id).await.map_err(|e| {
        tracing::error!("Failed to delete user {}: {}", id, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(
        MessageResponse::new("User deleted")
            .with_id(id)
            .with_deleted(deleted),
    ))
}

/// Build user API routes
pub fn user_routes(state: UserAppState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/adduser", post(add_user))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/users/permissions/:username", get(get_user_permissions))
        .with_state(state)
}
