//! Configuration loading and management
//!
//! One YAML document configures the cache, the remote source, the generator
//! and the mock server. Every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```yaml
//! cache:
//!   page_size: 50
//!   look_ahead_threshold: 5
//! source:
//!   base_url: http://localhost:6969
//!   listing: simplified
//!   timeout_ms: 10000
//! generator:
//!   batch_threshold: 100000
//! server:
//!   port: 6969
//!   record_count: 2500000
//! ```

use crate::core::error::{CacheError, CacheResult};
use crate::core::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::core::sort::SortConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Cache behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    /// Rows per page of the view
    #[validate(range(min = 1, max = 10000))]
    pub page_size: usize,

    /// Rows from the end of the view at which the next page is fetched
    pub look_ahead_threshold: usize,

    /// Ordering applied before the user picks one
    pub default_sort: Option<SortConfig>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            look_ahead_threshold: crate::cache::controller::DEFAULT_LOOK_AHEAD_THRESHOLD,
            default_sort: None,
        }
    }
}

/// Which listing endpoint a remote source talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingContract {
    /// `GET /api/users`: server filters, sorts and pages
    Full,
    /// `GET /api/users/paginated`: server pages only
    #[default]
    Simplified,
}

/// Remote source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceSettings {
    #[validate(url)]
    pub base_url: String,

    pub listing: ListingContract,

    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6969".to_string(),
            listing: ListingContract::default(),
            timeout_ms: 10_000,
        }
    }
}

/// Background data generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Counts above this are streamed in batches, smaller ones arrive at once
    pub batch_threshold: usize,

    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Messages buffered between the generator thread and its consumer
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            batch_threshold: 100_000,
            batch_size: 50_000,
            channel_capacity: 8,
        }
    }
}

/// Mock server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(length(min = 1))]
    pub host: String,

    pub port: u16,

    /// Users generated at startup
    pub record_count: usize,

    /// Origins allowed by CORS; empty allows any
    pub allowed_origins: Vec<String>,
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6969,
            record_count: 10_000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeckConfig {
    #[validate(nested)]
    pub cache: CacheSettings,

    #[validate(nested)]
    pub source: SourceSettings,

    #[validate(nested)]
    pub generator: GeneratorSettings,

    #[validate(nested)]
    pub server: ServerSettings,
}

impl DeckConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.check()?;
        Ok(config)
    }

    /// Check every section
    pub fn check(&self) -> CacheResult<()> {
        self.validate().map_err(|errors| CacheError::Config {
            message: errors.to_string(),
        })?;
        if self.cache.page_size > MAX_PAGE_SIZE {
            return Err(CacheError::Config {
                message: format!("cache.page_size must not exceed {}", MAX_PAGE_SIZE),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::user::UserField;

    #[test]
    fn test_empty_document_is_default() {
        let config = DeckConfig::from_yaml_str("").unwrap();
        assert_eq!(config, DeckConfig::default());
        assert_eq!(config.server.port, 6969);
        assert_eq!(config.cache.page_size, 50);
        assert_eq!(config.generator.batch_threshold, 100_000);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
cache:
  page_size: 25
  default_sort:
    field: jobTitle
    direction: desc
source:
  listing: full
"#;
        let config = DeckConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.page_size, 25);
        assert_eq!(config.cache.look_ahead_threshold, 5);
        assert_eq!(
            config.cache.default_sort,
            Some(SortConfig::desc(UserField::JobTitle))
        );
        assert_eq!(config.source.listing, ListingContract::Full);
        assert_eq!(config.source.base_url, "http://localhost:6969");
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = DeckConfig::from_yaml_str("cache:\n  page_size: 0\n").unwrap_err();
        let err = err.downcast::<CacheError>().unwrap();
        assert!(matches!(err, CacheError::Config { .. }));
    }

    #[test]
    fn test_bad_url_is_rejected() {
        let config = DeckConfig {
            source: SourceSettings {
                base_url: "not a url".to_string(),
                ..SourceSettings::default()
            },
            ..DeckConfig::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_bind_address() {
        let server = ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..ServerSettings::default()
        };
        assert_eq!(server.bind_address(), "0.0.0.0:8080");
    }
}
