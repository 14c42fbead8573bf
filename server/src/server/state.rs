use std::sync::Arc;
use std::time::Instant;

use sqlx::AnyPool;

use crate::collection::{CollectionAppState, CollectionService, RandomSampler};
use crate::config::CollectionConfig;
use crate::slide::ImagingStore;
use crate::studyset::{StudySetAppState, StudySetStore};
use crate::users::{UserAppState, UserDirectory, UserStore};

/// Shared application state
///
/// Holds the two pools and the services built on them. Each feature router
/// receives its own narrower state derived from this one.
#[derive(Clone)]
pub struct AppState {
    pub primary: AnyPool,
    pub imaging: Arc<dyn ImagingStore>,
    pub study_sets: Arc<StudySetStore>,
    pub collections: Arc<CollectionService>,
    pub sampler: Arc<RandomSampler>,
    pub users: Arc<UserStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        primary: AnyPool,
        imaging: Arc<dyn ImagingStore>,
        directory: Arc<dyn UserDirectory>,
        collections: &CollectionConfig,
    ) -> Self {
        let study_sets = StudySetStore::new(primary.clone(), imaging.clone());
        let collection_service = CollectionService::new(primary.clone(), imaging.clone())
            .with_per_collection_counts(collections.per_collection_counts);
        let sampler = RandomSampler::new(imaging.clone(), collections.random_sample_size);
        let users = UserStore::new(primary.clone(), directory);

        Self {
            primary,
            imaging,
            study_sets: Arc::new(study_sets),
            collections: Arc::new(collection_service),
            sampler: Arc::new(sampler),
            users: Arc::new(users),
            started_at: Instant::now(),
        }
    }

    pub fn studyset_state(&self) -> StudySetAppState {
        StudySetAppState {
            store: self.study_sets.clone(),
        }
    }

    pub fn collection_state(&self) -> CollectionAppState {
        CollectionAppState {
            service: self.collections.clone(),
            sampler: self.sampler.clone(),
        }
    }

    pub fn user_state(&self) -> UserAppState {
        UserAppState {
            store: self.users.clone(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ImagingFixture, primary_pool};
    use crate::users::StaticDirectory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_uptime_counts_from_state_creation() {
        let imaging = ImagingFixture::new().await;
        let mut state = AppState::new(
            primary_pool().await,
            imaging.shared_store(),
            Arc::new(StaticDirectory::new(None)),
            &CollectionConfig::default(),
        );
        assert_eq!(state.uptime_seconds(), 0);

        if let Some(earlier) = state.started_at.checked_sub(Duration::from_secs(90)) {
            state.started_at = earlier;
            assert_eq!(state.uptime_seconds(), 90);
            assert_eq!(state.clone().uptime_seconds(), 90);
        }
    }
}
