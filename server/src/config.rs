//! Server configuration
//!
//! Configuration is loaded once at startup from environment variables, with
//! database credentials falling back to secret files (one value per file) in
//! `SECRETS_DIR`.

use std::env;
use std::path::{Path, PathBuf};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::warn;

/// Keys read from the secrets directory to assemble the primary store URL
const POSTGRES_SECRET_KEYS: [&str; 5] = [
    "POSTGRES_USER",
    "POSTGRES_PASS",
    "POSTGRES_HOST",
    "POSTGRES_PORT",
    "POSTGRES_DB",
];

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Collection browsing configuration
    pub collections: CollectionConfig,

    /// User directory configuration
    pub directory: DirectoryConfig,

    /// Static file serving configuration
    pub static_files: StaticFilesConfig,
}

/// Connection settings for the primary and imaging stores
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Primary (study sets, collections, users) store URL
    pub primary_url: Option<String>,
    /// Read-only imaging store URL
    pub imaging_url: Option<String>,
    /// Pool size for each store
    pub max_connections: u32,
    /// Schema qualifying the imaging store's data-group and stain tables
    pub imaging_core_schema: Option<String>,
    /// Create primary tables at startup when missing
    pub auto_migrate: bool,
}

/// Collection-related configuration
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Compute real per-collection slide counts (otherwise reported as zero)
    pub per_collection_counts: bool,
    /// Number of groups drawn by the random sampler
    pub random_sample_size: usize,
}

/// User directory configuration
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// Usernames accepted when adding users; `None` accepts any username
    pub allowed_users: Option<Vec<String>>,
}

/// Static file serving configuration
#[derive(Debug, Clone, Default)]
pub struct StaticFilesConfig {
    /// Directory holding the client build
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database: DatabaseConfig::default(),
            collections: CollectionConfig::default(),
            directory: DirectoryConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            primary_url: None,
            imaging_url: None,
            max_connections: 10,
            imaging_core_schema: None,
            auto_migrate: true,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            per_collection_counts: false,
            random_sample_size: crate::collection::DEFAULT_SAMPLE_SIZE,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Read a single trimmed secret value, `None` if the file is missing or empty
fn read_secret(dir: &Path, key: &str) -> Option<String> {
    let path = dir.join(key);
    match std::fs::read_to_string(&path) {
        Ok(value) => {
            let value = value.trim().to_string();
            (!value.is_empty()).then_some(value)
        }
        Err(_) => None,
    }
}

/// Assemble the primary store URL from the PostgreSQL secret files
fn primary_url_from_secrets(dir: &Path) -> Option<String> {
    let mut values = Vec::with_capacity(POSTGRES_SECRET_KEYS.len());
    for key in POSTGRES_SECRET_KEYS {
        match read_secret(dir, key) {
            Some(value) => values.push(value),
            None => {
                if dir.exists() {
                    warn!("Secret {} missing from {:?}", key, dir);
                }
                return None;
            }
        }
    }

    // Credentials may contain URL delimiters such as '@' or '/'
    Some(format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        utf8_percent_encode(&values[0], NON_ALPHANUMERIC),
        utf8_percent_encode(&values[1], NON_ALPHANUMERIC),
        values[2],
        values[3],
        values[4]
    ))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Database config
        let secrets_dir = env::var("SECRETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/run/secrets"));

        config.database.primary_url = env::var("PRIMARY_DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| primary_url_from_secrets(&secrets_dir));
        config.database.imaging_url = env::var("IMAGING_DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| read_secret(&secrets_dir, "IMAGING_DATABASE_URL"));

        if let Ok(val) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(v) = val.parse()
        {
            config.database.max_connections = v;
        }
        if let Ok(schema) = env::var("IMAGING_CORE_SCHEMA")
            && !schema.is_empty()
        {
            config.database.imaging_core_schema = Some(schema);
        }
        if let Ok(val) = env::var("PRIMARY_AUTO_MIGRATE") {
            config.database.auto_migrate = parse_flag(&val);
        }

        // Collection config
        if let Ok(val) = env::var("COLLECTION_COUNTS_ENABLED") {
            config.collections.per_collection_counts = parse_flag(&val);
        }
        if let Ok(val) = env::var("RANDOM_SAMPLE_SIZE")
            && let Ok(v) = val.parse()
        {
            config.collections.random_sample_size = v;
        }

        // Directory config
        if let Ok(val) = env::var("DIRECTORY_ALLOWED_USERS") {
            let users: Vec<String> = val
                .split(',')
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if !users.is_empty() {
                config.directory.allowed_users = Some(users);
            }
        }

        // Static files
        if let Ok(dir) = env::var("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files.dir = Some(PathBuf::from(dir));
        }

        config
    }
}
