//! User and permission management
//!
//! Users are confirmed against a `UserDirectory` before they are stored;
//! permissions are managed as whole sets per user.

mod directory;
pub mod routes;
mod store;
mod types;

pub use directory::{StaticDirectory, UserDirectory};
pub use routes::{UserAppState, user_routes};
pub use store::UserStore;
pub use types::{User, UserError, UserInput};
