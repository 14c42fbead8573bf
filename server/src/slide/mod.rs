//! Slide reference module for the imaging database
//!
//! This module provides:
//! - `ImagingStore` trait abstracting the read-only imaging database
//! - `SqlImagingStore`, the SQL implementation of that trait
//! - Derived slide fields: grouping checksums and viewer URL fragments

pub mod reference;
mod service;
mod sql;
mod types;

pub use reference::{compute_group_key, derive_viewer_url};
pub use service::ImagingStore;
pub use sql::{EDUCATION_DATA_GROUP, SqlImagingStore};
pub use types::{
    ALL_COLLECTIONS, CollectionFilter, CollectionItem, GroupCandidate, SlideError, SlideRecord,
};
