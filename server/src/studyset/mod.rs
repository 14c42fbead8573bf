//! Study-set module
//!
//! A study set is a titled, user-owned list of slides stored in the primary
//! database. Writes resolve every slide against the imaging store and run in
//! a single transaction.

pub mod routes;
mod store;
mod types;

pub use routes::{StudySetAppState, studyset_routes};
pub use store::StudySetStore;
pub use types::{StudySet, StudySetDetail, StudySetError, StudySetRequest, ViewMode};
