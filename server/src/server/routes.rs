use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use super::state::AppState;
use crate::collection::collection_routes;
use crate::studyset::studyset_routes;
use crate::users::user_routes;

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub primary_store: String,
    pub imaging_store: String,
    pub uptime_seconds: u64,
}

fn readiness(ok: bool) -> String {
    if ok { "ready" } else { "unavailable" }.to_string()
}

/// GET /health - Ping both stores
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let primary_ok = match crate::db::ping(&state.primary).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Primary store health check failed: {}", e);
            false
        }
    };
    let imaging_ok = match state.imaging.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Imaging store health check failed: {}", e);
            false
        }
    };

    let healthy = primary_ok && imaging_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            primary_store: readiness(primary_ok),
            imaging_store: readiness(imaging_ok),
            uptime_seconds: state.uptime_seconds(),
        }),
    )
}

/// Build the API router: health plus every feature router
///
/// Each feature router carries its own state, so they are merged after
/// `AppState` is applied.
pub fn build_router(state: AppState) -> Router {
    let study_sets = studyset_routes(state.studyset_state());
    let collections = collection_routes(state.collection_state());
    let users = user_routes(state.user_state());

    Router::new()
        .route("/health", get(health))
        .with_state(state)
        .merge(study_sets)
        .merge(collections)
        .merge(users)
}
