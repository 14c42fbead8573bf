//! Collection module
//!
//! This module provides:
//! - `CollectionService` for listing, browsing and editing collections
//! - `RandomSampler` for drawing random slide groups from a collection
//! - HTTP routes for both

pub mod routes;
mod sampling;
mod service;
mod types;

pub use routes::{CollectionAppState, collection_routes};
pub use sampling::{DEFAULT_SAMPLE_SIZE, RandomSampler, pick_groups};
pub use service::CollectionService;
pub use types::{Collection, CollectionError, CollectionInput};
