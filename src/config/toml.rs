//! TOML gateway file parsing

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Keys that no schema field claimed
pub type UnknownKeys = BTreeMap<String, toml::Value>;

/// TOML gateway file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub netzone_search_path: Vec<PathBuf>,
    pub firewall_script: Option<PathBuf>,
    pub interfaces: BTreeMap<String, TomlInterface>,
    pub gateways: BTreeMap<String, TomlGateway>,
    pub routing: TomlRouting,
    #[serde(flatten)]
    pub unknown: UnknownKeys,
}

/// Device group, either one of the well-known names or a raw group number
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TomlDevGroup {
    Id(u32),
    Name(String),
}

/// `[interfaces.<name>]`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TomlInterface {
    pub devgroup: Option<TomlDevGroup>,
    pub gateway: Option<String>,
    #[serde(flatten)]
    pub unknown: UnknownKeys,
}

/// `[gateways.<name>]`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TomlGateway {
    pub link: Option<String>,
    pub interface: Option<String>,
    pub interfaces: Option<Vec<String>>,
    pub gateway: Option<String>,
    #[serde(flatten)]
    pub unknown: UnknownKeys,
}

/// `[routing]`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TomlRouting {
    pub tables: Vec<TomlRouteTable>,
    pub rules: Vec<String>,
    #[serde(flatten)]
    pub unknown: UnknownKeys,
}

/// `[[routing.tables]]`, entries are `[target, gateway]` pairs
#[derive(Debug, Deserialize)]
pub struct TomlRouteTable {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<(String, String)>,
    #[serde(flatten)]
    pub unknown: UnknownKeys,
}

/// Load the gateway file. A missing file yields an empty configuration.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    if !path.exists() {
        info!(
            "Config file does not exist: {}, assume empty config",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    info!("Loading gateway config file: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotReadable {
        path: path.display().to_string(),
    })?;

    parse_toml_config(&content)
}

/// Parse gateway file content
pub fn parse_toml_config(content: &str) -> Result<TomlConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}
