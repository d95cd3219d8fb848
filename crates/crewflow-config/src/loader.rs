//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::CrewflowConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load full Crewflow configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<CrewflowConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: CrewflowConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &CrewflowConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.runner.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "runner.poll_interval_ms must be > 0".to_string(),
        ));
    }

    if config.runner.max_concurrent == 0 {
        return Err(ConfigError::Invalid(
            "runner.max_concurrent must be > 0".to_string(),
        ));
    }

    if config.runner.reaper_enabled && config.runner.reaper_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "runner.reaper_timeout_secs must be > 0 when the reaper is enabled".to_string(),
        ));
    }

    for (name, spec) in [("status", &config.stores.status), ("audit", &config.stores.audit)] {
        if spec.backend.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "stores.{}.backend must not be empty",
                name
            )));
        }
    }

    Ok(())
}
