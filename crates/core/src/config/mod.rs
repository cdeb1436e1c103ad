//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading:
//!
//! 1. TOML config file (`colorwise.toml`, or an explicit path)
//! 2. Built-in defaults
//!
//! The version identifier defaults to the `COLORWISE_APP_VERSION` value baked
//! in at compile time. Nothing is read from the runtime environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "colorwise.toml";

/// Where cache stores are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database at `db_path`.
    #[default]
    Sqlite,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version identifier; changing it invalidates every previously cached entry.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix of every cache store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Origin the application is served from.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path prefix of the application. Requests for exactly this path are
    /// navigational, and only same-origin URLs under it are written through.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// URLs stored on install, resolved against `origin`.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Cache storage backend.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version() -> String {
    option_env!("COLORWISE_APP_VERSION").unwrap_or("dev").into()
}

fn default_cache_prefix() -> String {
    "colorwise-".into()
}

fn default_origin() -> String {
    "http://localhost:4173".into()
}

fn default_scope() -> String {
    "/colorwise-app/".into()
}

// The entry page is left out on purpose: it is always fetched fresh.
fn default_precache_urls() -> Vec<String> {
    vec![
        "/colorwise-app/manifest.json".into(),
        "/colorwise-app/colorwise-icon.svg".into(),
        "/colorwise-app/icon-192.png".into(),
        "/colorwise-app/icon-512.png".into(),
    ]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./colorwise-cache.sqlite")
}

fn default_user_agent() -> String {
    "colorwise-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            scope: default_scope(),
            precache_urls: default_precache_urls(),
            storage: StorageBackend::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Name of the current cache store: prefix followed by the version.
    pub fn cache_name(&self) -> String {
        format!("{}{}", self.cache_prefix, self.version)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Copy of this configuration with a different version identifier.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }

    /// Load configuration from `colorwise.toml` (if present) over defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the TOML file at `path` over defaults.
    ///
    /// A missing file leaves the defaults in place.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be parsed
    /// - Validation fails after loading
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path.as_ref()));

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
