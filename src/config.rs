//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Remote backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// API root, e.g. "https://link.samifying.com/api"
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_user_agent() -> String {
    format!("linkcache/{}", env!("CARGO_PKG_VERSION"))
}

/// Background synchronisation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Incremental sync interval in seconds (default: 300)
    pub interval_seconds: u64,
    /// Page size used by the full resync (default: 30)
    pub page_size: u32,
    /// Run a full resync once before the first incremental cycle
    #[serde(default)]
    pub full_sync_on_startup: bool,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Seconds before a cached record is considered stale (default: 3600)
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds as i64)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (LINKCACHE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/linkcache.db")?
            .set_default("backend.base_url", "https://link.samifying.com/api")?
            .set_default("backend.timeout_seconds", 30)?
            .set_default("sync.interval_seconds", 300)?
            .set_default("sync.page_size", 30)?
            .set_default("sync.full_sync_on_startup", false)?
            .set_default("cache.ttl_seconds", 3600)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("LINKCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        let base_url = url::Url::parse(&self.backend.base_url).map_err(|e| {
            AppError::Config(format!(
                "backend.base_url is not a valid URL ({}): {}",
                self.backend.base_url, e
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Config(
                "backend.base_url must use http or https".to_string(),
            ));
        }

        if self.backend.timeout_seconds == 0 {
            return Err(AppError::Config(
                "backend.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.sync.interval_seconds == 0 {
            return Err(AppError::Config(
                "sync.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.sync.page_size) {
            return Err(AppError::Config(
                "sync.page_size must be between 1 and 100".to_string(),
            ));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
