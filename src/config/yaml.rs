//! YAML configuration parsing.
//!
//! Parses global configuration from `spotlight.yaml`.

use std::path::Path;

use super::{ConfigError, GlobalConfig, StorageConfig};

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load global configuration from a file.
    pub fn load_global_config(path: impl AsRef<Path>) -> Result<GlobalConfig, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        let config: GlobalConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate_global_config(&config)?;
        Ok(config)
    }

    /// Parse global configuration from a YAML string.
    pub fn parse_global_config(yaml: &str) -> Result<GlobalConfig, ConfigError> {
        let config: GlobalConfig = serde_yaml::from_str(yaml)?;
        Self::validate_global_config(&config)?;
        Ok(config)
    }

    /// Validate a global configuration.
    fn validate_global_config(config: &GlobalConfig) -> Result<(), ConfigError> {
        config.slots.validate()?;

        if config.lock_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "lock_timeout_secs cannot be zero".into(),
            ));
        }

        if let Some(StorageConfig::Sqlite { path, .. }) = &config.storage
            && path.trim().is_empty()
        {
            return Err(ConfigError::InvalidConfig(
                "sqlite storage requires a non-empty path".into(),
            ));
        }

        Ok(())
    }
}
