//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from files or defaults.

use crate::config::AppConfig;
use crate::net::resolve;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` is empty or contains whitespace
    /// - `scope` does not start and end with `/`
    /// - `origin` is not an absolute http(s) URL
    /// - a `precache_urls` entry cannot be resolved against the origin
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not contain whitespace".into() });
        }

        if !self.scope.starts_with('/') || !self.scope.ends_with('/') {
            return Err(ConfigError::Invalid { field: "scope".into(), reason: "must start and end with '/'".into() });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        for entry in &self.precache_urls {
            let url = resolve(&origin, entry)
                .map_err(|e| ConfigError::Invalid { field: "precache_urls".into(), reason: format!("{entry}: {e}") })?;
            if url.origin() != origin.origin() || !url.path().starts_with(&self.scope) {
                tracing::warn!(url = %url, scope = %self.scope, "pre-cache entry lies outside the application scope");
            }
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: &AppConfig) -> Option<String> {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { version: String::new(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("version"));
    }

    #[test]
    fn test_validate_version_whitespace() {
        let config = AppConfig { version: "v 2".into(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("version"));
    }

    #[test]
    fn test_validate_scope_slashes() {
        let config = AppConfig { scope: "/colorwise-app".into(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("scope"));
    }

    #[test]
    fn test_validate_relative_origin() {
        let config = AppConfig { origin: "colorwise.example".into(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_non_http_origin() {
        let config = AppConfig { origin: "ftp://colorwise.example".into(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("origin"));
    }

    #[test]
    fn test_validate_unresolvable_precache_entry() {
        let config = AppConfig { precache_urls: vec!["   ".into()], ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("precache_urls"));
    }

    #[test]
    fn test_validate_precache_outside_scope_is_allowed() {
        let config = AppConfig { precache_urls: vec!["/favicon.ico".into()], ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_bounds() {
        let zero = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(&zero).as_deref(), Some("max_bytes"));
        let huge = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(invalid_field(&huge).as_deref(), Some("max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let small = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(&small).as_deref(), Some("timeout_ms"));
        let large = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(&large).as_deref(), Some("timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(&config).as_deref(), Some("user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
        let config = AppConfig { max_bytes: 50 * 1024 * 1024, timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
