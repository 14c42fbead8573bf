//! Transactional study-set store
//!
//! Every write runs in one transaction on the primary store. Slide ids are
//! resolved against the imaging store while that transaction is open; the
//! two stores are not updated atomically, and a slow imaging store holds the
//! primary transaction open for the duration of the request.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use sqlx::{Any, AnyPool, Row, Transaction};
use tracing::{debug, info};

use crate::db::finish_transaction;
use crate::slide::{ImagingStore, SlideRecord};

use super::types::{StudySet, StudySetDetail, StudySetError, StudySetRequest, ViewMode};

/// Study-set store over the primary pool
pub struct StudySetStore {
    pool: AnyPool,
    imaging: Arc<dyn ImagingStore>,
}

impl StudySetStore {
    pub fn new(pool: AnyPool, imaging: Arc<dyn ImagingStore>) -> Self {
        Self { pool, imaging }
    }

    /// Create a study set and its membership; returns the new key
    pub async fn create(&self, request: &StudySetRequest) -> Result<i64, StudySetError> {
        request.validate()?;
        let start = Instant::now();

        let mut tx = self.pool.begin().await?;
        let result = self.create_in_tx(&mut tx, request).await;
        let id = finish_transaction(tx, result, "study set create").await?;

        counter!("pathslides_studysets_created_total").increment(1);
        histogram!("pathslides_studyset_write_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        info!(
            "Created study set {} ({:?}) with {} slides",
            id,
            request.title,
            request.slide_ids.len()
        );
        Ok(id)
    }

    async fn create_in_tx(
        &self,
        tx: &mut Transaction<'static, Any>,
        request: &StudySetRequest,
    ) -> Result<i64, StudySetError> {
        let row = sqlx::query(
            "INSERT INTO studyset_main (title, description, username) VALUES ($1, $2, $3) RETURNING pkey",
        )
        .bind(request.title.clone())
        .bind(request.description.clone())
        .bind(request.username.clone())
        .fetch_one(&mut **tx)
        .await?;
        let id: i64 = row.try_get(0)?;

        self.insert_members(tx, id, &request.slide_ids).await?;
        Ok(id)
    }

    /// Replace a study set's metadata and its whole membership
    ///
    /// An id with no stored study set fails with `NotFound` (HTTP 404), not
    /// with a validation error. Nothing is written in that case.
    pub async fn update(&self, id: i64, request: &StudySetRequest) -> Result<(), StudySetError> {
        request.validate()?;
        let start = Instant::now();

        let mut tx = self.pool.begin().await?;
        let result = self.update_in_tx(&mut tx, id, request).await;
        finish_transaction(tx, result, "study set update").await?;

        counter!("pathslides_studysets_updated_total").increment(1);
        histogram!("pathslides_studyset_write_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        info!(
            "Updated study set {} with {} slides",
            id,
            request.slide_ids.len()
        );
        Ok(())
    }

    async fn update_in_tx(
        &self,
        tx: &mut Transaction<'static, Any>,
        id: i64,
        request: &StudySetRequest,
    ) -> Result<(), StudySetError> {
        let updated = sqlx::query(
            "UPDATE studyset_main SET title = $1, description = $2 WHERE pkey = $3",
        )
        .bind(request.title.clone())
        .bind(request.description.clone())
        .bind(id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StudySetError::NotFound(id));
        }

        sqlx::query("DELETE FROM studyset_slides WHERE mainpkey = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;

        self.insert_members(tx, id, &request.slide_ids).await
    }

    /// Resolve each image id and insert one membership row per parent id
    ///
    /// The first resolution failure aborts the whole write.
    async fn insert_members(
        &self,
        tx: &mut Transaction<'static, Any>,
        id: i64,
        slide_ids: &[i64],
    ) -> Result<(), StudySetError> {
        for &image_id in slide_ids {
            let parent_id = self.imaging.resolve_parent_id(image_id).await?;

            debug!(
                "Adding slide {} (image {}) to study set {}",
                parent_id, image_id, id
            );
            sqlx::query("INSERT INTO studyset_slides (mainpkey, slideid) VALUES ($1, $2)")
                .bind(id)
                .bind(parent_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Delete a study set and its membership
    ///
    /// Deleting a key that does not exist succeeds; the return value reports
    /// whether a study set was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, StudySetError> {
        let mut tx = self.pool.begin().await?;
        let result = delete_in_tx(&mut tx, id).await;
        let existed = finish_transaction(tx, result, "study set delete").await?;

        if existed {
            counter!("pathslides_studysets_deleted_total").increment(1);
            info!("Deleted study set {}", id);
        } else {
            debug!("Delete of missing study set {} treated as success", id);
        }
        Ok(existed)
    }

    /// All study sets ordered by title
    pub async fn list(&self) -> Result<Vec<StudySet>, StudySetError> {
        self.fetch_study_sets(
            "SELECT pkey, title, description, username FROM studyset_main ORDER BY title",
        )
        .await
    }

    /// Dispatch a detail query by view mode
    pub async fn detail(&self, id: i64, mode: ViewMode) -> Result<StudySetDetail, StudySetError> {
        match mode {
            ViewMode::Count => Ok(StudySetDetail::Count(self.count().await?)),
            ViewMode::FullList => Ok(StudySetDetail::FullList(
                self.fetch_study_sets(
                    "SELECT pkey, title, description, username FROM studyset_main ORDER BY title DESC",
                )
                .await?,
            )),
            ViewMode::Members => Ok(StudySetDetail::Members(self.members(id).await?)),
        }
    }

    pub async fn count(&self) -> Result<i64, StudySetError> {
        let row = sqlx::query("SELECT COUNT(pkey) FROM studyset_main")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }

    /// Parent slide ids stored for a study set
    pub async fn member_ids(&self, id: i64) -> Result<Vec<i64>, StudySetError> {
        let rows = sqlx::query(
            "SELECT studyset_slides.slideid FROM studyset_slides \
             INNER JOIN studyset_main ON studyset_slides.mainpkey = studyset_main.pkey \
             WHERE studyset_slides.mainpkey = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<i64>, _>>()
            .map_err(StudySetError::from)
    }

    /// Resolved slide rows for a study set; empty without touching the
    /// imaging store when the set has no members
    pub async fn members(&self, id: i64) -> Result<Vec<SlideRecord>, StudySetError> {
        let parent_ids = self.member_ids(id).await?;
        if parent_ids.is_empty() {
            debug!("Study set {} has no slides", id);
            return Ok(Vec::new());
        }

        Ok(self.imaging.slides_by_parent(&parent_ids).await?)
    }

    async fn fetch_study_sets(&self, sql: &str) -> Result<Vec<StudySet>, StudySetError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let mut sets = Vec::with_capacity(rows.len());
        for row in &rows {
            sets.push(StudySet {
                pkey: row.try_get(0)?,
                title: row.try_get(1)?,
                description: row.try_get(2)?,
                username: row.try_get(3)?,
            });
        }
        Ok(sets)
    }
}

async fn delete_in_tx(
    tx: &mut Transaction<'static, Any>,
    id: i64,
) -> Result<bool, StudySetError> {
    sqlx::query("DELETE FROM studyset_slides WHERE mainpkey = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM studyset_main WHERE pkey = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(deleted.rows_affected() > 0)
}
