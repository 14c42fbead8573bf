//! Collection query service
//!
//! Collection metadata lives in the primary store; slide counts and item
//! listings come from the imaging store.

use std::sync::Arc;

use metrics::counter;
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use crate::slide::{CollectionFilter, CollectionItem, ImagingStore};

use super::types::{Collection, CollectionError, CollectionInput};

pub struct CollectionService {
    pool: AnyPool,
    imaging: Arc<dyn ImagingStore>,
    per_collection_counts: bool,
}

impl CollectionService {
    pub fn new(pool: AnyPool, imaging: Arc<dyn ImagingStore>) -> Self {
        Self {
            pool,
            imaging,
            per_collection_counts: false,
        }
    }

    /// Compute real slide counts for stored collections
    pub fn with_per_collection_counts(mut self, enabled: bool) -> Self {
        self.per_collection_counts = enabled;
        self
    }

    /// The synthetic "All" entry followed by stored collections by name
    pub async fn list(&self) -> Result<Vec<Collection>, CollectionError> {
        let total = self.imaging.count_eligible(&CollectionFilter::All).await?;

        let rows = sqlx::query(
            "SELECT pkey, display_name, descrip, short_name FROM collections ORDER BY display_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut collections = Vec::with_capacity(rows.len() + 1);
        collections.push(Collection::all(total));

        for row in &rows {
            let description: Option<String> = row.try_get(3)?;
            let description = description.unwrap_or_default();
            let count = if self.per_collection_counts && !description.is_empty() {
                self.imaging
                    .count_eligible(&CollectionFilter::ShortName(description.clone()))
                    .await?
            } else {
                0
            };

            let group: Option<String> = row.try_get(2)?;
            collections.push(Collection {
                id: row.try_get(0)?,
                collection: row.try_get(1)?,
                group: group.unwrap_or_default(),
                description,
                count,
            });
        }

        debug!("Listed {} collections", collections.len());
        Ok(collections)
    }

    /// Eligible slides of one collection (`"All"` for every collection)
    pub async fn items(&self, name: &str) -> Result<Vec<CollectionItem>, CollectionError> {
        let filter = CollectionFilter::from_name(name);
        Ok(self.imaging.collection_items(&filter).await?)
    }

    pub async fn add(&self, input: &CollectionInput) -> Result<i64, CollectionError> {
        input.validate()?;

        let row = sqlx::query(
            "INSERT INTO collections (display_name, descrip, short_name) VALUES ($1, $2, $3) RETURNING pkey",
        )
        .bind(input.collection.clone())
        .bind(input.group.clone())
        .bind(input.description.clone())
        .fetch_one(&self.pool)
        .await?;
        let id: i64 = row.try_get(0)?;

        counter!("pathslides_collections_created_total").increment(1);
        info!("Added collection {} ({:?})", id, input.collection);
        Ok(id)
    }

    pub async fn update(&self, id: i64, input: &CollectionInput) -> Result<(), CollectionError> {
        input.validate()?;

        let result = sqlx::query(
            "UPDATE collections SET display_name = $1, descrip = $2, short_name = $3 WHERE pkey = $4",
        )
        .bind(input.collection.clone())
        .bind(input.group.clone())
        .bind(input.description.clone())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CollectionError::NotFound(id));
        }
        info!("Updated collection {}", id);
        Ok(())
    }

    /// Delete a collection; returns whether a row existed
    pub async fn delete(&self, id: i64) -> Result<bool, CollectionError> {
        let result = sqlx::query("DELETE FROM collections WHERE pkey = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let existed = result.rows_affected() > 0;
        if existed {
            info!("Deleted collection {}", id);
        } else {
            debug!("Delete of missing collection {} treated as success", id);
        }
        Ok(existed)
    }
}
