//! User and permission types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when managing users
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found in directory: {0}")]
    NotInDirectory(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Directory unavailable: {0}")]
    Directory(String),

    #[error("Primary store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// A user together with the names of their permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub permissions: Vec<String>,
}

/// Body of add-user and update-permission requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserInput {
    /// Trimmed username, rejecting blanks
    pub fn username(&self) -> Result<&str, UserError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(UserError::Validation("Username is required".to_string()));
        }
        Ok(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_trimmed_and_required() {
        let input = UserInput {
            username: "  jdoe ".to_string(),
            permissions: vec![],
        };
        assert_eq!(input.username().unwrap(), "jdoe");

        let input = UserInput::default();
        assert!(matches!(input.username(), Err(UserError::Validation(_))));
    }

    #[test]
    fn test_update_body_without_username() {
        let input: UserInput = serde_json::from_str(r#"{"permissions": ["admin"]}"#).unwrap();
        assert!(input.username.is_empty());
        assert_eq!(input.permissions, vec!["admin"]);
    }
}
