//! SQL-backed imaging store

use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tracing::{debug, warn};

use crate::db::placeholders;

use super::reference::{compute_group_key, derive_viewer_url, viewer_url_for};
use super::service::ImagingStore;
use super::types::{CollectionFilter, CollectionItem, GroupCandidate, SlideError, SlideRecord};

/// Data group whose slides are exposed to the viewer
pub const EDUCATION_DATA_GROUP: &str = "EDUCATION";

/// Diagnosis shown for collection items with no recorded diagnosis
const UNKNOWN_DIAGNOSIS: &str = "Unknown";

/// Imaging store over an sqlx pool
pub struct SqlImagingStore {
    pool: AnyPool,
    datagroups_table: String,
    stain_table: String,
}

impl SqlImagingStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            datagroups_table: "DATAGROUPS".to_string(),
            stain_table: "STAIN".to_string(),
        }
    }

    /// Qualify the data-group and stain tables with a schema name
    pub fn with_core_schema(mut self, schema: Option<&str>) -> Self {
        if let Some(schema) = schema {
            self.datagroups_table = format!("{}.DATAGROUPS", schema);
            self.stain_table = format!("{}.STAIN", schema);
        }
        self
    }

    /// FROM clause joining images to slides, data groups, stains and body sites
    fn joined_tables(&self) -> String {
        format!(
            "FROM IMAGE \
             JOIN SLIDE ON SLIDE.ID = IMAGE.PARENTID \
             JOIN {dg} ON SLIDE.DATAGROUPID = {dg}.ID \
             JOIN {st} ON {st}.ID = SLIDE.STAINID \
             LEFT JOIN BODYSITE ON BODYSITE.ID = SLIDE.BODYSITEID",
            dg = self.datagroups_table,
            st = self.stain_table,
        )
    }

    fn eligible_predicate(&self) -> String {
        format!(
            "{dg}.NAME = '{group}' AND IMAGE.USER6 IS NOT NULL AND IMAGE.USER6 <> ''",
            dg = self.datagroups_table,
            group = EDUCATION_DATA_GROUP,
        )
    }

    fn ordering(&self) -> String {
        format!(
            "ORDER BY SLIDE.COLUMN06, BODYSITE.NAME, {}.SHORTNAME",
            self.stain_table
        )
    }

    /// Column list decoded by `slide_record_from_row`
    fn slide_columns(&self) -> String {
        format!(
            "IMAGE.IMAGEID, IMAGE.PARENTID, IMAGE.USER6, SLIDE.ID, \
             SLIDE.COLUMN02, SLIDE.COLUMN03, SLIDE.COLUMN04, SLIDE.COLUMN06, SLIDE.COLUMN07, \
             SLIDE.STAINID, {dg}.NAME, {st}.SHORTNAME, BODYSITE.NAME",
            dg = self.datagroups_table,
            st = self.stain_table,
        )
    }

    async fn fetch_slides(
        &self,
        condition: &str,
        binds: Vec<SlideBind>,
    ) -> Result<Vec<SlideRecord>, SlideError> {
        let sql = format!(
            "SELECT {} {} WHERE {} AND ({}) {}",
            self.slide_columns(),
            self.joined_tables(),
            self.eligible_predicate(),
            condition,
            self.ordering(),
        );

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                SlideBind::Int(v) => query.bind(v),
                SlideBind::Text(v) => query.bind(v),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(slide_record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SlideError::from)
    }
}

/// Value bound into a dynamically built slide query
enum SlideBind {
    Int(i64),
    Text(String),
}

/// Collection restriction clause, bound to `$1`
const COLLECTION_CLAUSE: &str = "(SLIDE.COLUMN_VSB_COL1 = $1 OR SLIDE.COLUMN_VSB_COL2 = $1 OR SLIDE.COLUMN_VSB_COL3 = $1)";

fn collection_clause(filter: &CollectionFilter) -> (String, Option<String>) {
    match filter {
        CollectionFilter::All => (String::new(), None),
        CollectionFilter::ShortName(name) => {
            (format!(" AND {}", COLLECTION_CLAUSE), Some(name.clone()))
        }
    }
}

fn slide_record_from_row(row: &AnyRow) -> Result<SlideRecord, sqlx::Error> {
    let parent_id: i64 = row.try_get(1)?;
    let link: Option<String> = row.try_get(2)?;
    let raw_group: Option<String> = row.try_get(7)?;

    Ok(SlideRecord {
        image_id: row.try_get(0)?,
        parent_id,
        new_url: viewer_url_for(link.as_deref()),
        link: link.unwrap_or_default(),
        slide_id: row.try_get(3)?,
        organ: row.try_get(4)?,
        diagnosis: row.try_get(5)?,
        column04: row.try_get(6)?,
        accession: compute_group_key(raw_group.as_deref(), parent_id),
        column07: row.try_get(8)?,
        stain_id: row.try_get(9)?,
        data_group: row.try_get(10)?,
        stain: row.try_get(11)?,
        body_site: row.try_get(12)?,
    })
}

fn collection_item_from_row(row: &AnyRow) -> Result<CollectionItem, sqlx::Error> {
    let link: Option<String> = row.try_get(1)?;
    let organ: Option<String> = row.try_get(2)?;
    let diagnosis: Option<String> = row.try_get(3)?;
    let raw_group: Option<String> = row.try_get(4)?;
    let stain: Option<String> = row.try_get(5)?;
    let parent_id: i64 = row.try_get(6)?;

    let link = link.unwrap_or_default();
    let diagnosis = diagnosis
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| UNKNOWN_DIAGNOSIS.to_string());

    Ok(CollectionItem {
        id: row.try_get(0)?,
        new_url: derive_viewer_url(&link),
        link,
        diagnosis,
        organ: organ.unwrap_or_default(),
        accession: compute_group_key(raw_group.as_deref(), parent_id),
        stain: stain.unwrap_or_default(),
        parent_id,
    })
}

#[async_trait]
impl ImagingStore for SqlImagingStore {
    async fn resolve_parent_id(&self, image_id: i64) -> Result<i64, SlideError> {
        let start = Instant::now();
        let rows = sqlx::query("SELECT PARENTID FROM IMAGE WHERE IMAGEID = $1")
            .bind(image_id)
            .fetch_all(&self.pool)
            .await?;
        histogram!("pathslides_slide_resolve_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match rows.as_slice() {
            [row] => {
                let parent_id: i64 = row.try_get(0)?;
                debug!("Resolved image {} to parent {}", image_id, parent_id);
                Ok(parent_id)
            }
            [] => {
                counter!("pathslides_slide_resolve_failures_total").increment(1);
                Err(SlideError::NotFound(image_id))
            }
            _ => {
                counter!("pathslides_slide_resolve_failures_total").increment(1);
                warn!("Image {} matches {} slides", image_id, rows.len());
                Err(SlideError::Ambiguous {
                    image_id,
                    matches: rows.len(),
                })
            }
        }
    }

    async fn count_eligible(&self, filter: &CollectionFilter) -> Result<i64, SlideError> {
        let (clause, bind) = collection_clause(filter);
        let sql = format!(
            "SELECT COUNT(SLIDE.ID) \
             FROM IMAGE \
             JOIN SLIDE ON SLIDE.ID = IMAGE.PARENTID \
             JOIN {dg} ON SLIDE.DATAGROUPID = {dg}.ID \
             WHERE {eligible}{clause}",
            dg = self.datagroups_table,
            eligible = self.eligible_predicate(),
            clause = clause,
        );

        let mut query = sqlx::query(&sql);
        if let Some(name) = bind {
            query = query.bind(name);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    async fn collection_items(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<CollectionItem>, SlideError> {
        let (clause, bind) = collection_clause(filter);
        let sql = format!(
            "SELECT IMAGE.IMAGEID, IMAGE.USER6, SLIDE.COLUMN02, SLIDE.COLUMN03, SLIDE.COLUMN06, \
             {st}.SHORTNAME, IMAGE.PARENTID {from} WHERE {eligible}{clause} {order}",
            st = self.stain_table,
            from = self.joined_tables(),
            eligible = self.eligible_predicate(),
            clause = clause,
            order = self.ordering(),
        );

        let mut query = sqlx::query(&sql);
        if let Some(name) = bind {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(collection_item_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SlideError::from)
    }

    async fn group_candidates(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<GroupCandidate>, SlideError> {
        let (clause, bind) = collection_clause(filter);
        let sql = format!(
            "SELECT SLIDE.COLUMN06, MIN(IMAGE.PARENTID) \
             FROM IMAGE \
             JOIN SLIDE ON SLIDE.ID = IMAGE.PARENTID \
             JOIN {dg} ON SLIDE.DATAGROUPID = {dg}.ID \
             WHERE {eligible} AND SLIDE.COLUMN06 IS NOT NULL{clause} \
             GROUP BY SLIDE.COLUMN06 \
             ORDER BY SLIDE.COLUMN06",
            dg = self.datagroups_table,
            eligible = self.eligible_predicate(),
            clause = clause,
        );

        let mut query = sqlx::query(&sql);
        if let Some(name) = bind {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            groups.push(GroupCandidate {
                group_value: row.try_get(0)?,
                parent_id: row.try_get(1)?,
            });
        }
        debug!("Found {} candidate groups for {:?}", groups.len(), filter);
        Ok(groups)
    }

    async fn slides_by_parent(&self, parent_ids: &[i64]) -> Result<Vec<SlideRecord>, SlideError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let condition = format!(
            "IMAGE.PARENTID IN ({})",
            placeholders(1, parent_ids.len())
        );
        let binds = parent_ids.iter().copied().map(SlideBind::Int).collect();
        self.fetch_slides(&condition, binds).await
    }

    async fn slides_by_group(
        &self,
        groups: &[GroupCandidate],
    ) -> Result<Vec<SlideRecord>, SlideError> {
        let (by_parent, by_value): (Vec<&GroupCandidate>, Vec<&GroupCandidate>) =
            groups.iter().partition(|g| g.matches_by_parent());

        let mut conditions = Vec::with_capacity(2);
        let mut binds = Vec::with_capacity(groups.len());

        if !by_value.is_empty() {
            conditions.push(format!(
                "SLIDE.COLUMN06 IN ({})",
                placeholders(binds.len() + 1, by_value.len())
            ));
            binds.extend(
                by_value
                    .iter()
                    .map(|g| SlideBind::Text(g.group_value.clone().unwrap_or_default())),
            );
        }
        if !by_parent.is_empty() {
            conditions.push(format!(
                "IMAGE.PARENTID IN ({})",
                placeholders(binds.len() + 1, by_parent.len())
            ));
            binds.extend(by_parent.iter().map(|g| SlideBind::Int(g.parent_id)));
        }

        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        self.fetch_slides(&conditions.join(" OR "), binds).await
    }

    async fn ping(&self) -> Result<(), SlideError> {
        crate::db::ping(&self.pool).await?;
        Ok(())
    }
}
