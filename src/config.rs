//! YAML configuration file support for facegate.
//!
//! Engine settings (storage backend, record compression, recognition policy)
//! live in a single YAML file that is loaded and validated at startup.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! # facegate engine configuration
//! version: "1.0"
//!
//! store:
//!   backend: "redb"
//!   redb_path: "./data/facegate.redb"
//!   compression: "zstd"
//!   compression_level: 3
//!
//! matcher:
//!   threshold: 0.6
//!   yield_every: 256
//! ```

use std::fs;
use std::path::Path;

use matcher::MatchConfig;
use serde::{Deserialize, Serialize};
use store::{BackendConfig, CompressionCodec, CompressionConfig};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration for the recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FacegateConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub store: StoreYamlConfig,

    #[serde(default)]
    pub matcher: MatchYamlConfig,
}

impl FacegateConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: FacegateConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.store.validate()?;
        self.matcher.validate()?;
        Ok(())
    }
}

impl Default for FacegateConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            store: StoreYamlConfig::default(),
            matcher: MatchYamlConfig::default(),
        }
    }
}

/// Storage YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub redb_path: Option<String>,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl StoreYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["in_memory", "redb"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "store.backend must be one of: {valid_backends:?}"
            )));
        }

        if self.backend == "redb" && self.redb_path.is_none() {
            return Err(ConfigLoadError::MissingField(
                "store.redb_path is required when backend is 'redb'".to_string(),
            ));
        }

        let valid_compression = ["zstd", "none"];
        if !valid_compression.contains(&self.compression.as_str()) {
            return Err(ConfigLoadError::Validation(format!(
                "store.compression must be one of: {valid_compression:?}"
            )));
        }

        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigLoadError::Validation(
                "store.compression_level must be between 1 and 22".to_string(),
            ));
        }

        Ok(())
    }

    /// Backend selection as understood by the `store` crate.
    pub fn backend_config(&self) -> BackendConfig {
        match (self.backend.as_str(), &self.redb_path) {
            ("redb", Some(path)) => BackendConfig::redb(path.clone()),
            _ => BackendConfig::in_memory(),
        }
    }

    pub fn compression_config(&self) -> CompressionConfig {
        let codec = match self.compression.as_str() {
            "none" => CompressionCodec::None,
            _ => CompressionCodec::Zstd,
        };
        CompressionConfig::new(codec, self.compression_level)
    }
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redb_path: None,
            compression: default_compression(),
            compression_level: default_compression_level(),
        }
    }
}

/// Recognition policy YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchYamlConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
}

impl MatchYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.match_config()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("matcher: {e}")))
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig::default()
            .with_threshold(self.threshold)
            .with_yield_every(self.yield_every)
    }
}

impl Default for MatchYamlConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            yield_every: default_yield_every(),
        }
    }
}

// Helper functions for serde defaults
fn default_backend() -> String {
    "in_memory".to_string()
}
fn default_compression() -> String {
    "zstd".to_string()
}
fn default_compression_level() -> i32 {
    3
}
fn default_threshold() -> f32 {
    MatchConfig::default().threshold
}
fn default_yield_every() -> usize {
    MatchConfig::default().yield_every
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
matcher:
  threshold: 0.8
"#;

        let config = FacegateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.matcher.threshold, 0.8);
        assert_eq!(config.matcher.yield_every, 256);
        assert_eq!(config.store.backend, "in_memory");
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
store:
  backend: "in_memory"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = FacegateConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.store.backend_config(), BackendConfig::in_memory());
    }

    #[test]
    fn test_default_config() {
        let config = FacegateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matcher.match_config(), MatchConfig::default());
    }

    #[test]
    fn test_unsupported_version() {
        let result = FacegateConfig::from_yaml("version: \"2.0\"\n");
        assert!(matches!(
            result,
            Err(ConfigLoadError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn test_redb_requires_path() {
        let yaml = r#"
version: "1.0"
store:
  backend: "redb"
"#;
        let result = FacegateConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigLoadError::MissingField(_))));
    }

    #[test]
    fn test_matcher_validation() {
        let yaml = r#"
version: "1.0"
matcher:
  threshold: 0.0
"#;
        let err = FacegateConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_store_conversion() {
        let yaml = r#"
version: "1"
store:
  backend: "redb"
  redb_path: "/var/lib/facegate/data.redb"
  compression: "none"
  compression_level: 5
"#;
        let config = FacegateConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.store.backend_config(),
            BackendConfig::redb("/var/lib/facegate/data.redb")
        );
        let codec = config.store.compression_config();
        assert_eq!(codec.codec, CompressionCodec::None);
        assert_eq!(codec.level, 5);
    }
}
