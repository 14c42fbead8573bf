//! Slide-related types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel collection name meaning "no collection filter"
pub const ALL_COLLECTIONS: &str = "All";

/// Errors that can occur when reading the imaging store
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("Slide not found: image {0}")]
    NotFound(i64),

    #[error("Slide reference is ambiguous: image {image_id} matches {matches} slides")]
    Ambiguous { image_id: i64, matches: usize },

    #[error("Imaging store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Collection restriction applied to imaging queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionFilter {
    All,
    ShortName(String),
}

impl CollectionFilter {
    /// Interpret a collection name from a request path
    pub fn from_name(name: &str) -> Self {
        if name == ALL_COLLECTIONS {
            Self::All
        } else {
            Self::ShortName(name.to_string())
        }
    }
}

/// One distinct slide group eligible for random sampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCandidate {
    /// Raw grouping column value
    pub group_value: Option<String>,
    /// A parent id from the group, used when the grouping value is blank
    pub parent_id: i64,
}

impl GroupCandidate {
    /// Whether this group has to be matched by parent id
    pub fn matches_by_parent(&self) -> bool {
        self.group_value.as_deref().is_none_or(str::is_empty)
    }
}

/// Full slide row joined across the imaging tables
///
/// Field names on the wire follow the imaging store's column names, which is
/// what the viewer client reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(rename = "IMAGEID")]
    pub image_id: i64,
    #[serde(rename = "PARENTID")]
    pub parent_id: i64,
    /// Raw viewer link
    #[serde(rename = "USER6")]
    pub link: String,
    #[serde(rename = "ID")]
    pub slide_id: i64,
    #[serde(rename = "COLUMN02")]
    pub organ: Option<String>,
    #[serde(rename = "COLUMN03")]
    pub diagnosis: Option<String>,
    #[serde(rename = "COLUMN04")]
    pub column04: Option<String>,
    /// Grouping key (checksum, never the raw value)
    #[serde(rename = "COLUMN06")]
    pub accession: String,
    #[serde(rename = "COLUMN07")]
    pub column07: Option<String>,
    #[serde(rename = "STAINID")]
    pub stain_id: Option<i64>,
    #[serde(rename = "DATAGROUP")]
    pub data_group: String,
    #[serde(rename = "SHORTNAME")]
    pub stain: Option<String>,
    #[serde(rename = "NAME")]
    pub body_site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_url: Option<String>,
}

/// Denormalized projection of one eligible slide for collection browsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i64,
    pub link: String,
    pub diagnosis: String,
    pub organ: String,
    pub accession: String,
    pub stain: String,
    pub new_url: String,
    pub parent_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_filter_sentinel() {
        assert_eq!(CollectionFilter::from_name("All"), CollectionFilter::All);
        assert_eq!(
            CollectionFilter::from_name("GI"),
            CollectionFilter::ShortName("GI".to_string())
        );
        // The sentinel is case-sensitive
        assert_eq!(
            CollectionFilter::from_name("all"),
            CollectionFilter::ShortName("all".to_string())
        );
    }

    #[test]
    fn test_group_candidate_fallback() {
        let blank = GroupCandidate {
            group_value: Some(String::new()),
            parent_id: 7,
        };
        let missing = GroupCandidate {
            group_value: None,
            parent_id: 7,
        };
        let present = GroupCandidate {
            group_value: Some("S-100".to_string()),
            parent_id: 7,
        };
        assert!(blank.matches_by_parent());
        assert!(missing.matches_by_parent());
        assert!(!present.matches_by_parent());
    }
}
