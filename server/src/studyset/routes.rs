//! HTTP route handlers for the study-set API

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use super::store::StudySetStore;
use super::types::{StudySet, StudySetDetail, StudySetError, StudySetRequest, ViewMode};
use crate::error::{ErrorResponse, MessageResponse};
use crate::slide::SlideError;

/// Application state containing the study-set store
#[derive(Clone)]
pub struct StudySetAppState {
    pub store: Arc<StudySetStore>,
}

impl From<StudySetError> for ErrorResponse {
    fn from(e: StudySetError) -> Self {
        match &e {
            StudySetError::Validation(_) => ErrorResponse::bad_request("validation", e.to_string()),
            StudySetError::UnrecognizedMode(_) => {
                ErrorResponse::bad_request("unrecognized_mode", e.to_string())
            }
            StudySetError::NotFound(_) => ErrorResponse::not_found(e.to_string()),
            StudySetError::Slide(SlideError::NotFound(_)) => ErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "slide_not_found",
                e.to_string(),
            ),
            StudySetError::Slide(SlideError::Ambiguous { .. }) => ErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "ambiguous_slide",
                e.to_string(),
            ),
            StudySetError::Slide(SlideError::Store(_)) | StudySetError::Store(_) => {
                ErrorResponse::store_error()
            }
        }
    }
}

/// Log at a level matching the failure class, then convert
fn log_failure(action: &str, e: StudySetError) -> ErrorResponse {
    match &e {
        StudySetError::Store(_) | StudySetError::Slide(SlideError::Store(_)) => {
            tracing::error!("Failed to {}: {}", action, e);
        }
        _ => tracing::warn!("Failed to {}: {}", action, e),
    }
    ErrorResponse::from(e)
}

/// Query string of `GET /study-sets/:id`
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(rename = "type")]
    pub mode: Option<String>,
}

/// GET /study-sets - List all study sets ordered by title
pub async fn list_study_sets(
    State(state): State<StudySetAppState>,
) -> Result<Json<Vec<StudySet>>, ErrorResponse> {
    let sets = state
        .store
        .list()
        .await
        .map_err(|e| log_failure("list study sets", e))?;

    Ok(Json(sets))
}

/// GET /study-sets/:id?type=1|2|3 - Count, full list, or resolved members
pub async fn get_study_set(
    State(state): State<StudySetAppState>,
    path: Result<Path<i64>, PathRejection>,
    query_string: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<Json<StudySetDetail>, ErrorResponse> {
    let Path(id) = path?;
    let Query(query) = query_string?;
    let raw_mode = query.mode.ok_or_else(|| {
        ErrorResponse::bad_request("validation", "Query parameter 'type' is required")
    })?;
    let mode = ViewMode::from_query(&raw_mode)
        .map_err(|e| log_failure("parse study set view mode", e))?;

    let detail = state
        .store
        .detail(id, mode)
        .await
        .map_err(|e| log_failure(&format!("load study set {}", id), e))?;

    Ok(Json(detail))
}

/// POST /study-set-create - Create a study set with its slides
pub async fn create_study_set(
    State(state): State<StudySetAppState>,
    payload: Result<Json<StudySetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ErrorResponse> {
    let Json(request) = payload?;
    let id = state
        .store
        .create(&request)
        .await
        .map_err(|e| log_failure("create study set", e))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Study set created").with_id(id)),
    ))
}

/// PUT /study-sets/:id - Replace title, description and membership
pub async fn update_study_set(
    State(state): State<StudySetAppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StudySetRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let Json(request) = payload?;
    state
        .store
        .update(id, &request)
        .await
        .map_err(|e| log_failure(&format!("update study set {}", id), e))?;

    Ok(Json(MessageResponse::new("Study set updated").with_id(id)))
}

/// DELETE /study-sets/:id - Delete a study set and its membership
pub async fn delete_study_set(
    State(state): State<StudySetAppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let deleted = state
        .store
        .delete(id)
        .await
        .map_err(|e| log_failure(&format!("delete study set {}", id), e))?;

    Ok(Json(
        MessageResponse::new("Study set deleted")
            .with_id(id)
            .with_deleted(deleted),
    ))
}

/// Build study-set API routes
pub fn studyset_routes(state: StudySetAppState) -> Router {
    Router::new()
        .route("/study-sets", get(list_study_sets))
        .route(
            "/study-sets/:id",
            get(get_study_set)
                .put(update_study_set)
                .delete(delete_study_set),
        )
        .route("/study-set-create", post(create_study_set))
        .with_state(state)
}
