//! User directory lookups
//!
//! New users must be confirmed by a directory before they are stored. The
//! directory itself is external; `StaticDirectory` is the built-in
//! implementation backed by configuration.

use std::collections::HashSet;

use async_trait::async_trait;

use super::types::UserError;

/// Source of truth for which usernames exist
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether exactly one directory entry matches `username`
    async fn user_exists(&self, username: &str) -> Result<bool, UserError>;
}

/// Directory backed by an optional allow-list
///
/// Without an allow-list every non-empty username is accepted.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    allowed: Option<HashSet<String>>,
}

impl StaticDirectory {
    pub fn new(allowed: Option<Vec<String>>) -> Self {
        Self {
            allowed: allowed.map(|users| users.into_iter().collect()),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn user_exists(&self, username: &str) -> Result<bool, UserError> {
        if username.is_empty() {
            return Ok(false);
        }
        Ok(self
            .allowed
            .as_ref()
            .is_none_or(|allowed| allowed.contains(username)))
    }
}
