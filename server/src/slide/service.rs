//! ImagingStore trait definition

use async_trait::async_trait;

use super::types::{CollectionFilter, CollectionItem, GroupCandidate, SlideError, SlideRecord};

/// Read-only access to the imaging database
///
/// "Eligible" slides belong to the EDUCATION data group and carry a
/// non-empty viewer link.
#[async_trait]
pub trait ImagingStore: Send + Sync {
    /// Resolve an external image id to its parent slide id
    async fn resolve_parent_id(&self, image_id: i64) -> Result<i64, SlideError>;

    /// Count eligible slides, optionally restricted to one collection
    async fn count_eligible(&self, filter: &CollectionFilter) -> Result<i64, SlideError>;

    /// Eligible slides of a collection as browsing items
    async fn collection_items(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<CollectionItem>, SlideError>;

    /// Distinct slide groups eligible for sampling
    async fn group_candidates(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<GroupCandidate>, SlideError>;

    /// Eligible slides whose parent id is in `parent_ids`
    async fn slides_by_parent(&self, parent_ids: &[i64]) -> Result<Vec<SlideRecord>, SlideError>;

    /// Eligible slides belonging to any of `groups`
    async fn slides_by_group(
        &self,
        groups: &[GroupCandidate],
    ) -> Result<Vec<SlideRecord>, SlideError>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), SlideError>;
}
