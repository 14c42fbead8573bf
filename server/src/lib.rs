//! PathSlides Server Library
//!
//! This module exports the server components for use in integration tests
//! and external tooling.

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod server;
pub mod slide;
pub mod studyset;
pub mod users;

mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorResponse, MessageResponse};
pub use server::{AppState, build_router};
pub use slide::{ImagingStore, SqlImagingStore};
pub use studyset::StudySetStore;
