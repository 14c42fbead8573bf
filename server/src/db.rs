//! Connection pools and primary-schema bootstrap
//!
//! Both stores are reached through `sqlx::AnyPool`, so the same parameterised
//! SQL runs against PostgreSQL in production and SQLite in tests. Statements
//! use `$n` placeholders, which both backends accept.

use std::time::Duration;

use std::fmt::Display;

use metrics::counter;
use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyPool, Transaction};
use tracing::{debug, error, info, warn};

/// Database backend, detected from the connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

/// Open a pool for the given URL
///
/// In-memory SQLite databases live only as long as their connection, so they
/// are pinned to a single connection that is never recycled.
pub async fn connect(url: &str, max_connections: u32) -> Result<AnyPool, sqlx::Error> {
    sqlx::any::install_default_drivers();

    let options = if url.contains(":memory:") || url.contains("mode=memory") {
        AnyPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
    };

    let pool = options.connect(url).await?;
    debug!("Opened database pool (max_connections={})", max_connections);
    Ok(pool)
}

/// Render `count` consecutive placeholders starting at `$start`
pub fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run a trivial query to confirm the pool is usable
pub async fn ping(pool: &AnyPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Commit `tx` when `result` is Ok, otherwise roll it back and return the error
pub async fn finish_transaction<T, E>(
    tx: Transaction<'static, Any>,
    result: Result<T, E>,
    operation: &str,
) -> Result<T, E>
where
    E: From<sqlx::Error> + Display,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            counter!("pathslides_transaction_rollbacks_total", "operation" => operation.to_string())
                .increment(1);
            warn!("Rolling back {}: {}", operation, e);
            if let Err(rollback_err) = tx.rollback().await {
                error!("Rollback of {} failed: {}", operation, rollback_err);
            }
            Err(e)
        }
    }
}

const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS studyset_main (
        pkey BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        username TEXT
    )",
    "CREATE TABLE IF NOT EXISTS studyset_slides (
        mainpkey BIGINT NOT NULL,
        slideid BIGINT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_studyset_slides_main ON studyset_slides (mainpkey)",
    "CREATE TABLE IF NOT EXISTS collections (
        pkey BIGSERIAL PRIMARY KEY,
        display_name TEXT NOT NULL,
        descrip TEXT,
        short_name TEXT
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        uniqname TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS permissions (
        id BIGSERIAL PRIMARY KEY,
        permission_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS user_permissions (
        user_id BIGINT NOT NULL,
        permission_id BIGINT NOT NULL
    )",
];

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS studyset_main (
        pkey INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        username TEXT
    )",
    "CREATE TABLE IF NOT EXISTS studyset_slides (
        mainpkey INTEGER NOT NULL,
        slideid INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_studyset_slides_main ON studyset_slides (mainpkey)",
    "CREATE TABLE IF NOT EXISTS collections (
        pkey INTEGER PRIMARY KEY AUTOINCREMENT,
        display_name TEXT NOT NULL,
        descrip TEXT,
        short_name TEXT
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uniqname TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS permissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        permission_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS user_permissions (
        user_id INTEGER NOT NULL,
        permission_id INTEGER NOT NULL
    )",
];

/// Create the primary store's tables if they do not exist yet
pub async fn migrate_primary(pool: &AnyPool, backend: Backend) -> Result<(), sqlx::Error> {
    let statements = match backend {
        Backend::Postgres => POSTGRES_SCHEMA,
        Backend::Sqlite => SQLITE_SCHEMA,
    };

    for statement in statements.iter().copied() {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Primary schema ready ({:?})", backend);
    Ok(())
}
