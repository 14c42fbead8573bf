//! Shared application state and the top-level API router

mod routes;
mod state;

pub use routes::{HealthResponse, build_router, health};
pub use state::AppState;
