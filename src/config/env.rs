//! Environment variable configuration handling

use crate::config::AppConfig;
use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "GWTOOL_";

/// Apply environment variable configuration over base configuration
pub fn apply_env_config(base_config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_vars(base_config, |key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
}

fn apply_vars<F>(mut base_config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(workspace) = lookup("WORKSPACE") {
        base_config.workspace = PathBuf::from(workspace);
    }

    if let Some(config) = lookup("CONFIG") {
        base_config.config_file = Some(PathBuf::from(config));
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        base_config.log_level = level;
    }

    if let Some(data_dir) = lookup("DATA_DIR") {
        base_config.data_dir = PathBuf::from(data_dir);
    }

    if let Some(dry_run) = lookup("DRY_RUN") {
        base_config.dry_run = parse_bool(&dry_run)?;
    }

    Ok(base_config)
}

/// Accepts the usual spellings of a boolean flag
fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidFormat(format!(
            "Invalid boolean value for {}DRY_RUN: '{}'",
            ENV_PREFIX, other
        ))),
    }
}
