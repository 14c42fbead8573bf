//! User and permission store
//!
//! Permission names are looked up in the `permissions` table; names that do
//! not exist there are skipped rather than rejected.

use std::sync::Arc;

use metrics::counter;
use sqlx::{Any, AnyPool, Row, Transaction};
use tracing::{debug, info};

use crate::db::finish_transaction;

use super::directory::UserDirectory;
use super::types::{User, UserError, UserInput};

pub struct UserStore {
    pool: AnyPool,
    directory: Arc<dyn UserDirectory>,
}

impl UserStore {
    pub fn new(pool: AnyPool, directory: Arc<dyn UserDirectory>) -> Self {
        Self { pool, directory }
    }

    /// Every user with their permission names, ordered by username
    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        let rows = sqlx::query(
            "SELECT u.id, u.uniqname, p.permission_name FROM users u \
             LEFT JOIN user_permissions up ON u.id = up.user_id \
             LEFT JOIN permissions p ON up.permission_id = p.id \
             ORDER BY u.uniqname, p.permission_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut users: Vec<User> = Vec::new();
        for row in &rows {
            let id: i64 = row.try_get(0)?;
            let permission: Option<String> = row.try_get(2)?;

            if users.last().is_none_or(|user| user.id != id) {
                users.push(User {
                    id,
                    username: row.try_get(1)?,
                    permissions: Vec::new(),
                });
            }
            if let (Some(permission), Some(user)) = (permission, users.last_mut()) {
                user.permissions.push(permission);
            }
        }
        Ok(users)
    }

    /// Permission names of a user; empty for an unknown username
    pub async fn permissions_for(&self, username: &str) -> Result<Vec<String>, UserError> {
        let rows = sqlx::query(
            "SELECT p.permission_name FROM users u \
             JOIN user_permissions up ON u.id = up.user_id \
             JOIN permissions p ON up.permission_id = p.id \
             WHERE u.uniqname = $1 \
             ORDER BY p.permission_name",
        )
        .bind(username.to_string())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            debug!("No permissions for {}", username);
        }
        rows.iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<String>, _>>()
            .map_err(UserError::from)
    }

    /// Add a directory-confirmed user with an initial permission set
    pub async fn add(&self, input: &UserInput) -> Result<User, UserError> {
        let username = input.username()?;
        if !self.directory.user_exists(username).await? {
            return Err(UserError::NotInDirectory(username.to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let result = add_in_tx(&mut tx, username, &input.permissions).await;
        let id = finish_transaction(tx, result, "user add").await?;

        counter!("pathslides_users_created_total").increment(1);
        info!("Added user {} ({})", username, id);
        Ok(User {
            id,
            username: username.to_string(),
            permissions: self.permissions_for(username).await?,
        })
    }

    /// Replace a user's permission set
    pub async fn update_permissions(
        &self,
        id: i64,
        permissions: &[String],
    ) -> Result<(), UserError> {
        let mut tx = self.pool.begin().await?;
        let result = update_in_tx(&mut tx, id, permissions).await;
        finish_transaction(tx, result, "user update").await?;

        info!("Updated permissions of user {}: {:?}", id, permissions);
        Ok(())
    }

    /// Delete a user and their permission links; returns whether one existed
    pub async fn delete(&self, id: i64) -> Result<bool, UserError> {
        let mut tx = self.pool.begin().await?;
        let result = delete_in_tx(&mut tx, id).await;
        let existed = finish_transaction(tx, result, "user delete").await?;

        if existed {
            info!("Deleted user {}", id);
        } else {
            debug!("Delete of missing user {} treated as success", id);
        }
        Ok(existed)
    }
}

async fn add_in_tx(
    tx: &mut Transaction<'static, Any>,
    username: &str,
    permissions: &[String],
) -> Result<i64, UserError> {
    let existing = sqlx::query("SELECT id FROM users WHERE uniqname = $1")
        .bind(username.to_string())
        .fetch_optional(&mut **tx)
        .await?;
    if existing.is_some() {
        return Err(UserError::AlreadyExists(username.to_string()));
    }

    let row = sqlx::query("INSERT INTO users (uniqname) VALUES ($1) RETURNING id")
        .bind(username.to_string())
        .fetch_one(&mut **tx)
        .await?;
    let id: i64 = row.try_get(0)?;

    link_permissions(tx, id, permissions).await?;
    Ok(id)
}

async fn update_in_tx(
    tx: &mut Transaction<'static, Any>,
    id: i64,
    permissions: &[String],
) -> Result<(), UserError> {
    let existing = sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    if existing.is_none() {
        return Err(UserError::NotFound(id));
    }

    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    link_permissions(tx, id, permissions).await
}

async fn delete_in_tx(tx: &mut Transaction<'static, Any>, id: i64) -> Result<bool, UserError> {
    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(deleted.rows_affected() > 0)
}

async fn link_permissions(
    tx: &mut Transaction<'static, Any>,
    user_id: i64,
    permissions: &[String],
) -> Result<(), UserError> {
    for permission in permissions {
        let linked = sqlx::query(
            "INSERT INTO user_permissions (user_id, permission_id) \
             SELECT $1, id FROM permissions WHERE permission_name = $2",
        )
        .bind(user_id)
        .bind(permission.clone())
        .execute(&mut **tx)
        .await?;

        if linked.rows_affected() == 0 {
            debug!("Ignoring unknown permission {:?}", permission);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{count_rows, primary_pool};
    use crate::users::StaticDirectory;

    async fn setup(allowed: Option<Vec<String>>) -> UserStore {
        let pool = primary_pool().await;
        sqlx::query("INSERT INTO permissions (permission_name) VALUES ('admin'), ('editor')")
            .execute(&pool)
            .await
            .unwrap();
        UserStore::new(pool, Arc::new(StaticDirectory::new(allowed)))
    }

    fn input(username: &str, permissions: &[&str]) -> UserInput {
        UserInput {
            username: username.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_add_user_with_permissions() {
        let store = setup(None).await;

        let user = store
            .add(&input("jdoe", &["editor", "admin", "unknown"]))
            .await
            .unwrap();
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.permissions, vec!["admin", "editor"]);
        assert_eq!(
            store.permissions_for("jdoe").await.unwrap(),
            vec!["admin", "editor"]
        );
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_directory_user() {
        let store = setup(Some(vec!["jdoe".to_string()])).await;

        let result = store.add(&input("mallory", &["admin"])).await;
        assert!(matches!(result, Err(UserError::NotInDirectory(_))));
        assert_eq!(count_rows(&store.pool, "users").await, 0);
    }

    #[tokio::test]
    async fn test_add_duplicate_rolls_back() {
        let store = setup(None).await;
        store.add(&input("jdoe", &["admin"])).await.unwrap();

        let result = store.add(&input("jdoe", &["editor"])).await;
        assert!(matches!(result, Err(UserError::AlreadyExists(_))));
        assert_eq!(count_rows(&store.pool, "users").await, 1);
        assert_eq!(count_rows(&store.pool, "user_permissions").await, 1);
    }

    #[tokio::test]
    async fn test_list_includes_users_without_permissions() {
        let store = setup(None).await;
        store.add(&input("zed", &[])).await.unwrap();
        store.add(&input("amy", &["editor", "admin"])).await.unwrap();

        let users = store.list().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "amy");
        assert_eq!(users[0].permissions, vec!["admin", "editor"]);
        assert_eq!(users[1].username, "zed");
        assert!(users[1].permissions.is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_permissions() {
        let store = setup(None).await;
        let user = store.add(&input("jdoe", &["admin"])).await.unwrap();

        store
            .update_permissions(user.id, &["editor".to_string()])
            .await
            .unwrap();
        assert_eq!(store.permissions_for("jdoe").await.unwrap(), vec!["editor"]);

        store.update_permissions(user.id, &[]).await.unwrap();
        assert!(store.permissions_for("jdoe").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = setup(None).await;
        let result = store.update_permissions(5, &["admin".to_string()]).await;
        assert!(matches!(result, Err(UserError::NotFound(5))));
        assert_eq!(count_rows(&store.pool, "user_permissions").await, 0);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = setup(None).await;
        let user = store.add(&input("jdoe", &["admin"])).await.unwrap();

        assert!(store.delete(user.id).await.unwrap());
        assert!(!store.delete(user.id).await.unwrap());
        assert_eq!(count_rows(&store.pool, "user_permissions").await, 0);
        assert!(store.permissions_for("jdoe").await.unwrap().is_empty());
    }
}
