//! Declarative cache configuration.
//!
//! The configuration document is TOML with one table per cache name:
//!
//! ```toml
//! [caches.BlobCache]
//! implementation = "lru"
//! options = "initial_capacity=64"
//! status = "active"
//! size = 500
//! max_entry_size = 65536
//!
//! [caches.XSLTemplates]
//! status = "inactive"
//! size = "20"
//! ```
//!
//! `size` is required; `max_entry_size` falls back to the cache type's default
//! ceiling when absent. Numbers may be written as integers or numeric strings.
//! A block whose numbers do not parse, or whose implementation type is unknown,
//! is rejected as a whole and leaves the cache untouched.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};
use crate::ImplementationKind;

/// Status string that activates a cache. Anything else deactivates it.
pub const STATUS_ACTIVE: &str = "active";

/// Whole configuration document, keyed by cache name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfiguration {
    #[serde(default)]
    pub caches: BTreeMap<String, CacheSettings>,
}

impl CacheConfiguration {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `CacheError::Io` if the file cannot be read
    /// - `CacheError::Parse` if it is not a valid configuration document
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Settings of one cache, if the document mentions it.
    pub fn settings(&self, name: &str) -> Option<&CacheSettings> {
        self.caches.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Adds or replaces the settings of one cache.
    #[must_use]
    pub fn with_cache(mut self, name: &str, settings: CacheSettings) -> Self {
        self.caches.insert(name.to_string(), settings);
        self
    }
}

impl FromStr for CacheConfiguration {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Numeric setting written either as an integer or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Text(String),
}

impl SettingValue {
    /// Parses the value as an integer, naming `field` in the error.
    pub fn as_i64(&self, field: &str) -> CacheResult<i64> {
        match self {
            SettingValue::Integer(value) => Ok(*value),
            SettingValue::Text(text) => text.trim().parse::<i64>().map_err(|err| {
                CacheError::Configuration(format!("{field} {text:?} is not an integer: {err}"))
            }),
        }
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// Configuration block of a single cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Implementation type identifier (`lru`, `fifo`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,

    /// Free-form options handed to the implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,

    /// `active` or anything else for inactive. Absent keeps the current state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Maximum number of entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SettingValue>,

    /// Maximum size of one entry; absent means the type's default ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entry_size: Option<SettingValue>,
}

impl CacheSettings {
    pub fn new(size: i64) -> Self {
        Self {
            size: Some(SettingValue::Integer(size)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn implementation(mut self, kind: &str) -> Self {
        self.implementation = Some(kind.to_string());
        self
    }

    #[must_use]
    pub fn options(mut self, options: &str) -> Self {
        self.options = Some(options.to_string());
        self
    }

    #[must_use]
    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    #[must_use]
    pub fn max_entry_size(mut self, value: impl Into<SettingValue>) -> Self {
        self.max_entry_size = Some(value.into());
        self
    }

    /// Validates the block and converts it into typed values.
    ///
    /// Nothing is applied here; a block that fails validation must leave the
    /// cache exactly as it was.
    pub fn resolve(&self) -> CacheResult<ResolvedSettings> {
        let size = self
            .size
            .as_ref()
            .ok_or_else(|| CacheError::Configuration("size is required".to_string()))?
            .as_i64("size")?;
        let size = usize::try_from(size)
            .map_err(|_| CacheError::Configuration(format!("size must not be negative, got {size}")))?;

        let max_entry_size = self
            .max_entry_size
            .as_ref()
            .map(|value| value.as_i64("max_entry_size"))
            .transpose()?;

        let implementation = self
            .implementation
            .as_deref()
            .map(ImplementationKind::from_str)
            .transpose()?;

        Ok(ResolvedSettings {
            implementation,
            options: self.options.clone().unwrap_or_default(),
            active: self.status.as_deref().map(|status| status.trim() == STATUS_ACTIVE),
            size,
            max_entry_size,
        })
    }
}

/// A validated [`CacheSettings`] block.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub implementation: Option<ImplementationKind>,
    pub options: String,
    pub active: Option<bool>,
    pub size: usize,
    pub max_entry_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
        [caches.BlobCache]
        implementation = "lru"
        options = "initial_capacity=64"
        status = "active"
        size = 500
        max_entry_size = "65536"

        [caches.XSLTemplates]
        status = "off"
        size = "20"
    "#;

    #[test]
    fn test_parse_document() {
        let config: CacheConfiguration = DOCUMENT.parse().unwrap();
        assert_eq!(config.caches.len(), 2);

        let blob = config.settings("BlobCache").unwrap().resolve().unwrap();
        assert_eq!(blob.implementation, Some(ImplementationKind::Lru));
        assert_eq!(blob.options, "initial_capacity=64");
        assert_eq!(blob.active, Some(true));
        assert_eq!(blob.size, 500);
        assert_eq!(blob.max_entry_size, Some(65536));

        let templates = config.settings("XSLTemplates").unwrap().resolve().unwrap();
        assert_eq!(templates.implementation, None);
        assert_eq!(templates.active, Some(false));
        assert_eq!(templates.size, 20);
        assert_eq!(templates.max_entry_size, None);
    }

    #[test]
    fn test_empty_document() {
        let config: CacheConfiguration = "".parse().unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let err = "[caches.Broken\nsize = 1".parse::<CacheConfiguration>().unwrap_err();
        assert!(matches!(err, CacheError::Parse(_)));
    }

    #[test]
    fn test_missing_size_rejected() {
        let settings = CacheSettings::default().status("active");
        assert!(matches!(settings.resolve(), Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_unparseable_numbers_rejected() {
        let mut settings = CacheSettings::new(10);
        settings.size = Some("ten".into());
        assert!(settings.resolve().is_err());

        let settings = CacheSettings::new(10).max_entry_size("large");
        assert!(settings.resolve().is_err());

        assert!(CacheSettings::new(-1).resolve().is_err());
    }

    #[test]
    fn test_unknown_implementation_rejected() {
        let settings = CacheSettings::new(10).implementation("soft-reference");
        assert!(matches!(
            settings.resolve(),
            Err(CacheError::UnknownImplementation(_))
        ));
    }

    #[test]
    fn test_missing_status_keeps_state() {
        let resolved = CacheSettings::new(3).resolve().unwrap();
        assert_eq!(resolved.active, None);
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = CacheConfiguration::default().with_cache(
            "Pages",
            CacheSettings::new(42).implementation("fifo").status("active"),
        );
        let text = toml::to_string(&config).unwrap();
        let parsed: CacheConfiguration = text.parse().unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_missing() {
        let err = CacheConfiguration::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
