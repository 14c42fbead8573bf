//! Test Utilities Module
//!
//! Provides in-memory database fixtures for unit tests: a primary store with
//! the application schema and an imaging store seeded with reference tables.
//! This module is only compiled when running tests.

#![cfg(test)]

use std::sync::Arc;

use sqlx::AnyPool;

use crate::db::{Backend, connect, migrate_primary};
use crate::slide::{ImagingStore, SqlImagingStore};

// ============================================================================
// Primary store
// ============================================================================

/// Fresh in-memory primary store with the application schema
pub async fn primary_pool() -> AnyPool {
    let pool = connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open primary test database");
    migrate_primary(&pool, Backend::Sqlite)
        .await
        .expect("Failed to create primary schema");
    pool
}

/// Count rows of a primary-store table
pub async fn count_rows(pool: &AnyPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

// ============================================================================
// Imaging store
// ============================================================================

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

/// One image plus its parent slide, as inserted into the imaging fixture
#[derive(Debug, Clone)]
pub struct SlideRow {
    pub image_id: i64,
    pub parent_id: i64,
    pub link: String,
    pub group: Option<String>,
    pub diagnosis: Option<String>,
    pub data_group_id: i64,
    pub collection: Option<String>,
    pub stain_id: i64,
    pub body_site_id: Option<i64>,
}

impl SlideRow {
    /// Eligible EDUCATION slide with a viewer link and grouping value
    pub fn education(image_id: i64, parent_id: i64, group: &str) -> Self {
        Self {
            image_id,
            parent_id,
            link: format!("http://viewer/images/Teaching/slide-{}.svs", image_id),
            group: Some(group.to_string()),
            diagnosis: Some("Adenocarcinoma".to_string()),
            data_group_id: 1,
            collection: None,
            stain_id: 1,
            body_site_id: Some(1),
        }
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = link.to_string();
        self
    }

    pub fn with_group(mut self, group: Option<&str>) -> Self {
        self.group = group.map(str::to_string);
        self
    }

    pub fn with_diagnosis(mut self, diagnosis: Option<&str>) -> Self {
        self.diagnosis = diagnosis.map(str::to_string);
        self
    }

    pub fn in_data_group(mut self, data_group_id: i64) -> Self {
        self.data_group_id = data_group_id;
        self
    }

    pub fn in_collection(mut self, short_name: &str) -> Self {
        self.collection = Some(short_name.to_string());
        self
    }
}

/// In-memory imaging database with the reference tables populated
pub struct ImagingFixture {
    pub pool: AnyPool,
}

impl ImagingFixture {
    pub async fn new() -> Self {
        let pool = connect("sqlite::memory:", 1)
            .await
            .expect("Failed to open imaging test database");
        for statement in IMAGING_SCHEMA.iter().copied() {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .expect("Failed to create imaging schema");
        }
        Self { pool }
    }

    pub fn store(&self) -> SqlImagingStore {
        SqlImagingStore::new(self.pool.clone())
    }

    pub fn shared_store(&self) -> Arc<dyn ImagingStore> {
        Arc::new(self.store())
    }

    /// Insert an image row only
    pub async fn insert_image(&self, image_id: i64, parent_id: i64, link: &str) {
        sqlx::query("INSERT INTO IMAGE (IMAGEID, PARENTID, USER6) VALUES ($1, $2, $3)")
            .bind(image_id)
            .bind(parent_id)
            .bind(link.to_string())
            .execute(&self.pool)
            .await
            .expect("Failed to insert image");
    }

    /// Insert an image and (if new) its parent slide
    pub async fn insert_slide(&self, row: SlideRow) {
        sqlx::query(
            "INSERT OR IGNORE INTO SLIDE (ID, DATAGROUPID, STAINID, BODYSITEID, COLUMN02, \
             COLUMN03, COLUMN06, COLUMN_VSB_COL1) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(row.parent_id)
        .bind(row.data_group_id)
        .bind(row.stain_id)
        .bind(row.body_site_id)
        .bind("Colon".to_string())
        .bind(row.diagnosis.clone())
        .bind(row.group.clone())
        .bind(row.collection.clone())
        .execute(&self.pool)
        .await
        .expect("Failed to insert slide");

        self.insert_image(row.image_id, row.parent_id, &row.link)
            .await;
    }
}
