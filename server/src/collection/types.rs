//! Collection types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slide::{ALL_COLLECTIONS, SlideError};

/// Errors that can occur when browsing or editing collections
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Collection not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error("Primary store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// A named grouping of imaging slides
///
/// `description` holds the short code matched against the slide's
/// collection columns; `group` is a free-form grouping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub collection: String,
    pub group: String,
    pub description: String,
    pub count: i64,
}

impl Collection {
    /// Synthetic entry covering every eligible slide
    pub fn all(count: i64) -> Self {
        Self {
            id: 0,
            collection: ALL_COLLECTIONS.to_string(),
            group: ALL_COLLECTIONS.to_string(),
            description: ALL_COLLECTIONS.to_string(),
            count,
        }
    }
}

/// Body of collection add and update requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionInput {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CollectionInput {
    pub fn validate(&self) -> Result<(), CollectionError> {
        if self.collection.trim().is_empty() {
            return Err(CollectionError::Validation(
                "Collection name is required".to_string(),
            ));
        }
        Ok(())
    }
}
