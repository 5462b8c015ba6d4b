//! Configuration structures for the content migration engine.
//!
//! - [`BatchConfig`] - Page and batch sizes per content type
//! - [`MigrationConfig`] - Item concurrency and built-in hook switches
//! - [`ManifestConfig`] - Where and how the manifest is persisted
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`], and every section is
//! `#[serde(default)]` so a configuration file only needs the options it
//! changes.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hash::FxHashMap;
use crate::types::ContentType;

/// Batch sizing.
///
/// A batch is one page of source items handed to a batch migrator, so the
/// batch size is also the page size requested from the source endpoint.
///
/// # Examples
///
/// ```
/// use cm_core::{BatchConfig, ContentType};
///
/// let mut config = BatchConfig::default();
/// config.per_type.insert(ContentType::User, 500);
///
/// assert_eq!(config.size_for(ContentType::User), 500);
/// assert_eq!(config.size_for(ContentType::Workbook), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Batch size used when a content type has no override.
    pub default_size: usize,

    /// Per content type overrides.
    pub per_type: FxHashMap<ContentType, usize>,
}

impl BatchConfig {
    /// Returns the batch size for `content_type`.
    #[must_use]
    pub fn size_for(&self, content_type: ContentType) -> usize {
        self.per_type
            .get(&content_type)
            .copied()
            .unwrap_or(self.default_size)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_size: 100,
            per_type: FxHashMap::default(),
        }
    }
}

/// Migration behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Maximum number of items of one batch published at the same time.
    pub item_concurrency: usize,

    /// Skip items that a previous run already migrated.
    pub skip_previously_migrated: bool,

    /// Content types whose source pages are re-ordered parents-first.
    pub hierarchical_types: Vec<ContentType>,
}

impl MigrationConfig {
    /// Returns `true` if `content_type` is paged breadth-first.
    #[must_use]
    pub fn is_hierarchical(&self, content_type: ContentType) -> bool {
        self.hierarchical_types.contains(&content_type)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            item_concurrency: 4,
            skip_previously_migrated: true,
            hierarchical_types: ContentType::migration_order()
                .iter()
                .copied()
                .filter(|t| t.is_hierarchical())
                .collect(),
        }
    }
}

/// Manifest persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Where the manifest is written after a run. `None` keeps it in memory.
    pub path: Option<Utf8PathBuf>,

    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: None,
            pretty: true,
        }
    }
}

/// Root configuration for the content migration engine.
///
/// # Examples
///
/// ```
/// use cm_core::Config;
///
/// let config = Config::default();
/// assert!(config.validate().is_ok());
///
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// let parsed: Config = serde_json::from_str(&json).unwrap();
/// assert_eq!(parsed, config);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch sizing.
    pub batch: BatchConfig,

    /// Migration behavior.
    pub migration: MigrationConfig,

    /// Manifest persistence.
    pub manifest: ManifestConfig,
}

impl Config {
    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_owned()));
        }
        let contents = std::fs::read_to_string(path.as_std_path())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every option is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.default_size == 0 {
            return Err(ConfigError::invalid_option(
                "batch.default_size",
                "must be greater than zero",
            ));
        }
        if let Some((content_type, _)) = self.batch.per_type.iter().find(|(_, size)| **size == 0)
        {
            return Err(ConfigError::invalid_option(
                format!("batch.per_type.{content_type}"),
                "must be greater than zero",
            ));
        }
        if self.migration.item_concurrency == 0 {
            return Err(ConfigError::invalid_option(
                "migration.item_concurrency",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.default_size, 100);
        assert!(config.per_type.is_empty());
    }

    #[test]
    fn test_migration_config_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.item_concurrency, 4);
        assert!(config.skip_previously_migrated);
        assert_eq!(config.hierarchical_types, vec![ContentType::Project]);
        assert!(config.is_hierarchical(ContentType::Project));
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"batch": {"per_type": {"user": 250}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch.size_for(ContentType::User), 250);
        assert_eq!(config.batch.default_size, 100);
        assert_eq!(config.migration.item_concurrency, 4);
        assert!(config.manifest.pretty);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.batch.default_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "batch.default_size"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_override() {
        let mut config = Config::default();
        config.batch.per_type.insert(ContentType::Group, 0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch.per_type.group"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.migration.item_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Utf8Path::new("/nonexistent/cm/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn test_from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("config.json")).unwrap();
        std::fs::write(&path, r#"{"migration": {"item_concurrency": 8}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.migration.item_concurrency, 8);

        std::fs::write(&path, r#"{"migration": {"item_concurrency": 0}}"#).unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
