//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules: in-memory primary
//! and imaging databases, an application router wired to them, and request
//! helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use pathslides_server::config::CollectionConfig;
use pathslides_server::db::{self, Backend};
use pathslides_server::server::{AppState, build_router};
use pathslides_server::slide::{
    CollectionFilter, CollectionItem, GroupCandidate, ImagingStore, SlideError, SlideRecord,
    SqlImagingStore,
};
use pathslides_server::users::StaticDirectory;
use serde_json::Value;
use sqlx::AnyPool;
use std::sync::Arc;
use tower::util::ServiceExt;
use tower_http::cors::{Any, CorsLayer};

const IMAGING_SCHEMA: &[&str] = &[
    "CREATE TABLE DATAGROUPS (ID INTEGER PRIMARY KEY, NAME TEXT NOT NULL)",
    "CREATE TABLE STAIN (ID INTEGER PRIMARY KEY, SHORTNAME TEXT)",
    "CREATE TABLE BODYSITE (ID INTEGER PRIMARY KEY, NAME TEXT)",
    "CREATE TABLE SLIDE (
        ID INTEGER PRIMARY KEY,
        DATAGROUPID INTEGER NOT NULL,
        STAINID INTEGER,
        BODYSITEID INTEGER,
        COLUMN02 TEXT,
        COLUMN03 TEXT,
        COLUMN04 TEXT,
        COLUMN06 TEXT,
        COLUMN07 TEXT,
        COLUMN_VSB_COL1 TEXT,
        COLUMN_VSB_COL2 TEXT,
        COLUMN_VSB_COL3 TEXT
    )",
    "CREATE TABLE IMAGE (IMAGEID INTEGER NOT NULL, PARENTID INTEGER NOT NULL, USER6 TEXT)",
    "INSERT INTO DATAGROUPS (ID, NAME) VALUES (1, 'EDUCATION'), (2, 'RESEARCH')",
    "INSERT INTO STAIN (ID, SHORTNAME) VALUES (1, 'H&E'), (2, 'PAS')",
    "INSERT INTO BODYSITE (ID, NAME) VALUES (1, 'Colon'), (2, 'Liver')",
];

/// Router plus handles on both databases
pub struct TestApp {
    pub router: Router,
    pub primary: AnyPool,
    pub imaging: AnyPool,
}

impl TestApp {
    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("PUT", uri, body)).await
    }

    /// Insert an eligible EDUCATION slide and its image
    pub async fn seed_slide(&self, image_id: i64, parent_id: i64, group: &str, collection: &str) {
        seed_slide(&self.imaging, image_id, parent_id, group, collection, 1).await;
    }

    pub async fn seed_permissions(&self, names: &[&str]) {
        for name in names {
            sqlx::query("INSERT INTO permissions (permission_name) VALUES ($1)")
                .bind(name.to_string())
                .execute(&self.primary)
                .await
                .unwrap();
        }
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Fresh in-memory imaging database with reference tables populated
pub async fn imaging_pool() -> AnyPool {
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    for statement in IMAGING_SCHEMA.iter().copied() {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool
}

/// Fresh in-memory primary database with the application schema
pub async fn primary_pool() -> AnyPool {
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::migrate_primary(&pool, Backend::Sqlite).await.unwrap();
    pool
}

pub async fn seed_slide(
    pool: &AnyPool,
    image_id: i64,
    parent_id: i64,
    group: &str,
    collection: &str,
    data_group_id: i64,
) {
    sqlx::query(
        "INSERT OR IGNORE INTO SLIDE (ID, DATAGROUPID, STAINID, BODYSITEID, COLUMN02, COLUMN03, \
         COLUMN06, COLUMN_VSB_COL1) VALUES ($1, $2, 1, 1, 'Colon', 'Adenocarcinoma', $3, $4)",
    )
    .bind(parent_id)
    .bind(data_group_id)
    .bind(group.to_string())
    .bind(collection.to_string())
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO IMAGE (IMAGEID, PARENTID, USER6) VALUES ($1, $2, $3)")
        .bind(image_id)
        .bind(parent_id)
        .bind(format!("http://viewer/images/Teaching/slide-{}.svs", image_id))
        .execute(pool)
        .await
        .unwrap();
}

fn router_for(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    build_router(state).layer(cors)
}

/// Create a test application backed by in-memory databases
pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(CollectionConfig::default()).await
}

pub async fn create_test_app_with_config(collections: CollectionConfig) -> TestApp {
    let primary = primary_pool().await;
    let imaging = imaging_pool().await;

    let state = AppState::new(
        primary.clone(),
        Arc::new(SqlImagingStore::new(imaging.clone())),
        Arc::new(StaticDirectory::new(Some(vec![
            "jdoe".to_string(),
            "asmith".to_string(),
        ]))),
        &collections,
    );

    TestApp {
        router: router_for(state),
        primary,
        imaging,
    }
}

/// Imaging store whose every call fails, for degraded-path tests
pub struct UnavailableImagingStore;

#[async_trait]
impl ImagingStore for UnavailableImagingStore {
    async fn resolve_parent_id(&self, _image_id: i64) -> Result<i64, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn count_eligible(&self, _filter: &CollectionFilter) -> Result<i64, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn collection_items(
        &self,
        _filter: &CollectionFilter,
    ) -> Result<Vec<CollectionItem>, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn group_candidates(
        &self,
        _filter: &CollectionFilter,
    ) -> Result<Vec<GroupCandidate>, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn slides_by_parent(&self, _parent_ids: &[i64]) -> Result<Vec<SlideRecord>, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn slides_by_group(
        &self,
        _groups: &[GroupCandidate],
    ) -> Result<Vec<SlideRecord>, SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }

    async fn ping(&self) -> Result<(), SlideError> {
        Err(SlideError::Store(sqlx::Error::PoolClosed))
    }
}

/// Create a test application whose imaging store is down
pub async fn create_degraded_test_app() -> TestApp {
    let primary = primary_pool().await;
    let imaging = imaging_pool().await;

    let state = AppState::new(
        primary.clone(),
        Arc::new(UnavailableImagingStore),
        Arc::new(StaticDirectory::default()),
        &CollectionConfig::default(),
    );

    TestApp {
        router: router_for(state),
        primary,
        imaging,
    }
}

/// Initialize test logging for detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathslides=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
