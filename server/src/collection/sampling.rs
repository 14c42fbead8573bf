//! Random sampling of slide groups
//!
//! Sampling draws distinct groups, not individual slides. Each drawn group
//! is expanded back into every eligible slide it contains, so a group with
//! several slides contributes several rows.

use std::sync::Arc;

use metrics::counter;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::slide::{CollectionFilter, GroupCandidate, ImagingStore, SlideError, SlideRecord};

/// Default number of groups drawn per request
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Choose up to `max` distinct candidates uniformly without replacement
pub fn pick_groups<R: Rng + ?Sized>(
    candidates: &[GroupCandidate],
    max: usize,
    rng: &mut R,
) -> Vec<GroupCandidate> {
    let amount = max.min(candidates.len());
    if amount == 0 {
        return Vec::new();
    }

    index::sample(rng, candidates.len(), amount)
        .into_iter()
        .map(|i| candidates[i].clone())
        .collect()
}

/// Draws random group samples from the imaging store
pub struct RandomSampler {
    imaging: Arc<dyn ImagingStore>,
    sample_size: usize,
}

impl RandomSampler {
    pub fn new(imaging: Arc<dyn ImagingStore>, sample_size: usize) -> Self {
        Self {
            imaging,
            sample_size,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Sample a collection using a freshly seeded OS-backed generator
    pub async fn sample_collection(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<SlideRecord>, SlideError> {
        let mut rng = StdRng::from_os_rng();
        self.sample_collection_with(filter, &mut rng).await
    }

    pub async fn sample_collection_with<R: Rng + Send>(
        &self,
        filter: &CollectionFilter,
        rng: &mut R,
    ) -> Result<Vec<SlideRecord>, SlideError> {
        let candidates = self.imaging.group_candidates(filter).await?;
        if candidates.is_empty() {
            debug!("No eligible groups for {:?}", filter);
            return Ok(Vec::new());
        }

        let picked = pick_groups(&candidates, self.sample_size, rng);
        counter!("pathslides_random_groups_sampled_total").increment(picked.len() as u64);
        debug!(
            "Sampled {} of {} groups for {:?}",
            picked.len(),
            candidates.len(),
            filter
        );

        self.imaging.slides_by_group(&picked).await
    }
}
