//! HTTP route handlers for the collection API

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use super::sampling::RandomSampler;
use super::service::CollectionService;
use super::types::{Collection, CollectionError, CollectionInput};
use crate::error::{ErrorResponse, MessageResponse};
use crate::slide::{CollectionFilter, CollectionItem, SlideError, SlideRecord};

/// Application state for collection routes
#[derive(Clone)]
pub struct CollectionAppState {
    pub service: Arc<CollectionService>,
    pub sampler: Arc<RandomSampler>,
}

impl From<CollectionError> for ErrorResponse {
    fn from(e: CollectionError) -> Self {
        match &e {
            CollectionError::Validation(_) => ErrorResponse::bad_request("validation", e.to_string()),
            CollectionError::NotFound(_) => ErrorResponse::not_found(e.to_string()),
            CollectionError::Slide(_) | CollectionError::Store(_) => ErrorResponse::store_error(),
        }
    }
}

impl From<SlideError> for ErrorResponse {
    fn from(e: SlideError) -> Self {
        ErrorResponse::from(CollectionError::Slide(e))
    }
}

/// GET /collections - All collections, "All" first
pub async fn list_collections(
    State(state): State<CollectionAppState>,
) -> Result<Json<Vec<Collection>>, ErrorResponse> {
    let collections = state.service.list().await.map_err(|e| {
        tracing::error!("Failed to list collections: {}", e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(collections))
}

/// GET /collections/:name - Eligible slides of a collection
pub async fn get_collection_items(
    State(state): State<CollectionAppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<CollectionItem>>, ErrorResponse> {
    let Path(name) = path?;
    let items = state.service.items(&name).await.map_err(|e| {
        tracing::error!("Failed to list items of collection {}: {}", name, e);
        ErrorResponse::from(e)
    })?;

    tracing::debug!("Collection {} has {} items", name, items.len());
    Ok(Json(items))
}

/// GET /collections/randomset/:name - Random sample of slide groups
pub async fn get_random_set(
    State(state): State<CollectionAppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<SlideRecord>>, ErrorResponse> {
    let Path(name) = path?;
    let filter = CollectionFilter::from_name(&name);
    let rows = state
        .sampler
        .sample_collection(&filter)
        .await
        .map_err(|e| {
            tracing::error!("Failed to sample collection {}: {}", name, e);
            ErrorResponse::from(e)
        })?;

    Ok(Json(rows))
}

/// POST /collections/addcollection
pub async fn add_collection(
    State(state): State<CollectionAppState>,
    payload: Result<Json<CollectionInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Json(input) = payload?;
    let id = state.service.add(&input).await.map_err(|e| {
        tracing::warn!("Failed to add collection: {}", e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(MessageResponse::new("Collection added").with_id(id)))
}

/// PUT /collections/updatecollection/:id
pub async fn update_collection(
    State(state): State<CollectionAppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CollectionInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let Json(input) = payload?;
    state.service.update(id, &input).await.map_err(|e| {
        tracing::warn!("Failed to update collection {}: {}", id, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(MessageResponse::new("Collection updated").with_id(id)))
}

/// DELETE /collections/deletecollection/:id
pub async fn delete_collection(
    State(state): State<CollectionAppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let Path(id) = path?;
    let deleted = state.service.delete(id).await.map_err(|e| {
        tracing::error!("Failed to delete collection {}: {}", id, e);
        ErrorResponse::from(e)
    })?;

    Ok(Json(
        MessageResponse::new("Collection deleted")
            .with_id(id)
            .with_deleted(deleted),
    ))
}

/// Build collection API routes
pub fn collection_routes(state: CollectionAppState) -> Router {
    Router::new()
        .route("/collections", get(list_collections))
        .route("/collections/:name", get(get_collection_items))
        .route("/collections/randomset/:name", get(get_random_set))
        .route("/collections/addcollection", post(add_collection))
        .route("/collections/updatecollection/:id", put(update_collection))
        .route("/collections/deletecollection/:id", delete(delete_collection))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_codes() {
        let resp = ErrorResponse::from(CollectionError::NotFound(3));
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.code, "not_found");

        let resp = ErrorResponse::from(CollectionError::Validation("x".into()));
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);

        let resp = ErrorResponse::from(SlideError::Store(sqlx::Error::PoolClosed));
        assert_eq!(resp.code, "store_error");
    }
}
