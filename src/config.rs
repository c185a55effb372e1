//! Access layer configuration
//!
//! Loaded from a JSON file. Every field has a default; `validate` rejects
//! values that would make pagination or logging ill-defined.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::DEFAULT_PRIMARY_KEY;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Access layer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Identifier field used for coercion and default ordering
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Page size when the caller gives none
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,

    /// Upper bound on any requested page size
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,

    /// Server-side execution limit passed with every read
    #[serde(default)]
    pub max_time_ms: Option<u64>,

    /// Minimum log severity: trace, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}
fn default_per_page() -> u64 {
    15
}
fn default_max_per_page() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            max_time_ms: None,
            log_level: default_log_level(),
        }
    }
}

impl AccessConfig {
    /// Loads and validates a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: AccessConfig = serde_json::from_str(&content)?;
        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("primary_key", &config.primary_key),
            ],
        );
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.primary_key.is_empty() {
            return Err(ConfigError::Invalid("primary_key must not be empty".into()));
        }
        if self.default_per_page == 0 {
            return Err(ConfigError::Invalid("default_per_page must be > 0".into()));
        }
        if self.max_per_page < self.default_per_page {
            return Err(ConfigError::Invalid(format!(
                "max_per_page ({}) must be >= default_per_page ({})",
                self.max_per_page, self.default_per_page
            )));
        }
        if self.max_time_ms == Some(0) {
            return Err(ConfigError::Invalid("max_time_ms must be > 0".into()));
        }
        self.severity()?;
        Ok(())
    }

    /// Parsed log level
    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn or error.",
                self.log_level
            ))
        })
    }

    /// Applies the configured log level process-wide
    pub fn install_log_level(&self) -> ConfigResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }

    /// Page size for a request: the default when absent, never above the maximum
    pub fn per_page(&self, requested: Option<u64>) -> u64 {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.default_per_page)
            .min(self.max_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: AccessConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AccessConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_per_page_bounds() {
        let config = AccessConfig {
            max_per_page: 50,
            ..AccessConfig::default()
        };
        assert_eq!(config.per_page(None), 15);
        assert_eq!(config.per_page(Some(0)), 15);
        assert_eq!(config.per_page(Some(20)), 20);
        assert_eq!(config.per_page(Some(500)), 50);
    }

    #[test]
    fn test_validation_failures() {
        let cases = [
            AccessConfig {
                primary_key: String::new(),
                ..AccessConfig::default()
            },
            AccessConfig {
                default_per_page: 0,
                ..AccessConfig::default()
            },
            AccessConfig {
                max_per_page: 5,
                ..AccessConfig::default()
            },
            AccessConfig {
                max_time_ms: Some(0),
                ..AccessConfig::default()
            },
            AccessConfig {
                log_level: "loud".into(),
                ..AccessConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }
}
