//! Configuration types for the phase-space pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::format::TableFormat;
use crate::processors::predicates::FilterSpec;

/// Errors raised while loading, saving or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory scanned (non-recursively) for raw files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Root of the derived dataset tree
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("data/filtered")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_root: default_output_root(),
        }
    }
}

/// Filter thresholds and user-declared filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// `Position_Z` upper bound (exclusive) for `lt_threshold_filter`
    #[serde(default = "default_threshold_low")]
    pub threshold_low: f64,

    /// `Position_Z` lower bound (exclusive) for `gt_threshold_filter`
    #[serde(default = "default_threshold_high")]
    pub threshold_high: f64,

    /// Extra filters applied after the standard four
    #[serde(default)]
    pub custom: Vec<FilterSpec>,
}

fn default_threshold_low() -> f64 {
    20.02
}

fn default_threshold_high() -> f64 {
    20.11
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            threshold_low: default_threshold_low(),
            threshold_high: default_threshold_high(),
            custom: Vec::new(),
        }
    }
}

/// Storage formats and tree names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Format of the derived datasets
    #[serde(default)]
    pub format: TableFormat,

    /// Extension that selects raw files in the input directory
    #[serde(default = "default_raw_file_extension")]
    pub raw_file_extension: String,

    /// Tree holding the events in raw ROOT files
    #[serde(default = "default_raw_tree_name")]
    pub raw_tree_name: String,

    /// Tree the derived datasets are written under
    #[serde(default = "default_derived_tree_name")]
    pub derived_tree_name: String,
}

fn default_raw_file_extension() -> String {
    "root".to_string()
}

fn default_raw_tree_name() -> String {
    "Phase".to_string()
}

fn default_derived_tree_name() -> String {
    "tree".to_string()
}

impl IoConfig {
    /// Format used to read raw files, picked from their extension.
    ///
    /// `csv` reads CSV; anything else is treated as ROOT.
    pub fn raw_format(&self) -> TableFormat {
        self.raw_file_extension
            .trim_start_matches('.')
            .parse()
            .unwrap_or_default()
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            format: TableFormat::default(),
            raw_file_extension: default_raw_file_extension(),
            raw_tree_name: default_raw_tree_name(),
            derived_tree_name: default_derived_tree_name(),
        }
    }
}

/// Histogram rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Bins per numeric histogram
    #[serde(default = "default_histogram_bin_count")]
    pub histogram_bin_count: usize,

    /// Image width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_histogram_bin_count() -> usize {
    50
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            histogram_bin_count: default_histogram_bin_count(),
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub filters: FiltersConfig,

    #[serde(default)]
    pub io: IoConfig,

    #[serde(default)]
    pub reporting: ReportingConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path_str,
            source,
        })
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = serde_yaml::to_string(self).map_err(|source| ConfigError::Yaml {
            path: path_str.clone(),
            source,
        })?;
        std::fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path_str,
            source,
        })
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting.histogram_bin_count == 0 {
            return Err(ConfigError::Invalid(
                "reporting.histogram_bin_count must be at least 1".to_string(),
            ));
        }
        if self.reporting.width == 0 || self.reporting.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "image size must be non-zero, got {}x{}",
                self.reporting.width, self.reporting.height
            )));
        }
        if self.io.raw_file_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "io.raw_file_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::predicates::Comparator;
    use tempfile::tempdir;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.filters.threshold_low, 20.02);
        assert_eq!(config.filters.threshold_high, 20.11);
        assert!(config.filters.custom.is_empty());
        assert_eq!(config.io.format, TableFormat::Root);
        assert_eq!(config.io.raw_tree_name, "Phase");
        assert_eq!(config.reporting.histogram_bin_count, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
filters:
  threshold_high: 20.5
  custom:
    - name: forward_filter
      column: Direction_Z
      comparator: ge
      threshold: 0.9
io:
  format: csv
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.filters.threshold_low, 20.02);
        assert_eq!(config.filters.threshold_high, 20.5);
        assert_eq!(config.filters.custom.len(), 1);
        assert_eq!(config.filters.custom[0].comparator, Comparator::Ge);
        assert_eq!(config.io.format, TableFormat::Csv);
        assert_eq!(config.io.raw_file_extension, "root");
        assert_eq!(config.reporting.width, 1280);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        let mut config = PipelineConfig::default();
        config.reporting.histogram_bin_count = 25;

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded.reporting.histogram_bin_count, 25);
        assert_eq!(loaded.paths.output_root, config.paths.output_root);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = PipelineConfig::from_yaml(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.reporting.histogram_bin_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.reporting.height = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.io.raw_file_extension = ".".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_raw_format_follows_extension() {
        let mut io = IoConfig::default();
        assert_eq!(io.raw_format(), TableFormat::Root);
        io.raw_file_extension = ".CSV".to_string();
        assert_eq!(io.raw_format(), TableFormat::Csv);
        io.raw_file_extension = "dat".to_string();
        assert_eq!(io.raw_format(), TableFormat::Root);
    }
}
