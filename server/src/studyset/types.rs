//! Study-set types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slide::{SlideError, SlideRecord};

/// Errors that can occur when working with study sets
#[derive(Debug, Error)]
pub enum StudySetError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Study set not found: {0}")]
    NotFound(i64),

    #[error("Unrecognized view mode: {0}")]
    UnrecognizedMode(String),

    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error("Primary store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// A named, user-curated list of slides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySet {
    pub pkey: i64,
    pub title: String,
    pub description: Option<String>,
    pub username: Option<String>,
}

/// Body of create and update requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudySetRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// External image ids, resolved to parent slide ids before storage
    #[serde(default)]
    pub slide_ids: Vec<i64>,
}

impl StudySetRequest {
    pub fn validate(&self) -> Result<(), StudySetError> {
        if self.title.trim().is_empty() {
            return Err(StudySetError::Validation("Title is required".to_string()));
        }
        Ok(())
    }
}

/// Projection requested from `GET /study-sets/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Total number of study sets
    Count,
    /// Every study set, ordered by title descending
    FullList,
    /// Resolved slide rows of one study set
    Members,
}

impl ViewMode {
    /// Parse the `type` query value ("1", "2" or "3")
    pub fn from_query(value: &str) -> Result<Self, StudySetError> {
        match value {
            "1" => Ok(Self::Count),
            "2" => Ok(Self::FullList),
            "3" => Ok(Self::Members),
            other => Err(StudySetError::UnrecognizedMode(other.to_string())),
        }
    }
}

/// Result of a detail query, one variant per view mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StudySetDetail {
    Count(i64),
    FullList(Vec<StudySet>),
    Members(Vec<SlideRecord>),
}
