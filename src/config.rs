//! Pipeline configuration.
//!
//! Loaded from YAML; every field has a default so an empty file is valid.

use crate::bands::{BandError, CriticalBands, OutOfRangePolicy, ZWICKER_BOUNDARIES};
use crate::export::DEFAULT_SEED;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Bad critical_bands setting: {0}")]
    InvalidBands(#[from] BandError),

    #[error("JSON indent must be at most {max}, got {got}")]
    InvalidIndent { got: usize, max: usize },
}

const MAX_JSON_INDENT: usize = 16;

/// Dataset assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetConfig {
    /// Seed for the export shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Critical-band boundaries in Hz, strictly ascending
    #[serde(default = "default_critical_bands")]
    pub critical_bands: Vec<f64>,
    /// What to do with tones outside the band table
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,
    /// Indentation of curve specification JSON
    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

const fn default_seed() -> u64 {
    DEFAULT_SEED
}
fn default_critical_bands() -> Vec<f64> {
    ZWICKER_BOUNDARIES.to_vec()
}
const fn default_json_indent() -> usize {
    4
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            critical_bands: default_critical_bands(),
            out_of_range: OutOfRangePolicy::default(),
            json_indent: default_json_indent(),
        }
    }
}

impl DatasetConfig {
    /// Load and validate configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the band table and JSON indent
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBands` or `ConfigError::InvalidIndent`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bands()?;
        if self.json_indent > MAX_JSON_INDENT {
            return Err(ConfigError::InvalidIndent {
                got: self.json_indent,
                max: MAX_JSON_INDENT,
            });
        }
        Ok(())
    }

    /// The configured band table
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBands` if the boundaries are not a valid table.
    pub fn bands(&self) -> Result<CriticalBands, ConfigError> {
        Ok(CriticalBands::new(self.critical_bands.clone())?)
    }

    /// Same configuration with a different seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// An annotated example configuration file
    #[must_use]
    pub fn example_yaml() -> &'static str {
        r"# stimulus-dataset configuration

# Seed for the export shuffle; same seed + same input = identical files
seed: 1

# Critical-band boundaries in Hz (band i covers [b_i, b_i+1), top edge inclusive)
critical_bands: [20, 100, 200, 300, 400, 510, 630, 770, 920, 1080, 1270, 1480, 1720,
                 2000, 2320, 2700, 3150, 3700, 4400, 5300, 6400, 7700, 9500, 12000,
                 15500, 20000]

# Tones outside the band table: abort | skip
out_of_range: abort

# Indentation of SPECS_*.json files
json_indent: 4
"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = DatasetConfig::default();
        assert_eq!(config.seed, 1);
        assert_eq!(config.critical_bands.len(), 26);
        assert_eq!(config.out_of_range, OutOfRangePolicy::Abort);
        assert_eq!(config.json_indent, 4);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = DatasetConfig::from_yaml("{}").unwrap();
        assert_eq!(config, DatasetConfig::default());
    }

    #[test]
    fn test_example_yaml_parses_to_defaults() {
        let config = DatasetConfig::from_yaml(DatasetConfig::example_yaml()).unwrap();
        assert_eq!(config, DatasetConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let config = DatasetConfig::from_yaml("seed: 42\nout_of_range: skip\n").unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.out_of_range, OutOfRangePolicy::Skip);
        assert_eq!(config.json_indent, 4);
    }

    #[test]
    fn test_rejects_unsorted_bands() {
        let result = DatasetConfig::from_yaml("critical_bands: [100, 50, 200]\n");
        assert!(matches!(result, Err(ConfigError::InvalidBands(_))));
    }

    #[test]
    fn test_rejects_huge_indent() {
        let result = DatasetConfig::from_yaml("json_indent: 100\n");
        assert!(matches!(result, Err(ConfigError::InvalidIndent { .. })));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = DatasetConfig::from_yaml("out_of_range: clamp\n");
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = DatasetConfig::default().with_seed(7);
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        let parsed = DatasetConfig::from_yaml(&yaml).expect("deserialize");
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_missing_file() {
        let result = DatasetConfig::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
