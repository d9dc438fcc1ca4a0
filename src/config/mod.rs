//! Configuration management module
//!
//! Runtime settings are resolved with the precedence
//! CLI arguments > environment variables > defaults. The gateway file (TOML)
//! is then loaded from the resolved path and validated into the declared
//! topology consumed by [`crate::topology`].

use crate::error::ConfigError;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod cli;
pub mod env;
pub mod toml;

use self::toml::{TomlConfig, TomlDevGroup, TomlGateway, TomlInterface, UnknownKeys};

/// Runtime settings of one gwtool invocation
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Instance directory, holds configuration and scripts
    pub workspace: PathBuf,
    /// Explicit gateway file, `<workspace>/configs/gateway.toml` when unset
    pub config_file: Option<PathBuf>,
    pub log_level: String,
    /// Builtin data shipped with gwtool (netzones, nftables scripts)
    pub data_dir: PathBuf,
    pub dry_run: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("/opt/gateway"),
            config_file: None,
            log_level: "info".to_string(),
            data_dir: PathBuf::from("/usr/share/gwtool"),
            dry_run: false,
        }
    }
}

impl AppConfig {
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.workspace.join("configs").join("gateway.toml"))
    }

    /// Netzone directory that is always searched last
    pub fn builtin_netzones(&self) -> PathBuf {
        self.data_dir.join("netzones")
    }

    pub fn default_firewall_script(&self) -> PathBuf {
        self.data_dir.join("nftables").join("firewall.nft")
    }

    /// Load and validate the gateway file named by these settings
    pub fn load_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let raw = self::toml::load_toml_config(&self.config_path())?;
        GatewayConfig::from_toml(raw, &self.builtin_netzones())
    }
}

/// Well-known device groups, anything else must be given as a number
const DEVGROUPS: &[(&str, u32)] = &[("wan", 1), ("lan", 2), ("guest", 3), ("tunnel", 4)];

/// Declared interface settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub name: String,
    pub devgroup: Option<u32>,
    pub gateway: Option<IpAddr>,
}

/// Declared gateway, one variant per mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecl {
    /// Points at another gateway by name
    Alias(String),
    Single {
        interface: String,
        gateway: Option<IpAddr>,
    },
    Multi(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEntry {
    pub name: String,
    pub decl: GatewayDecl,
}

/// One `(target, gateway)` row of a custom route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntrySpec {
    /// Literal CIDR or netzone name
    pub target: String,
    pub gateway: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTableSpec {
    pub table: String,
    pub entries: Vec<RouteEntrySpec>,
}

/// Validated content of the gateway file
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    pub gateways: BTreeMap<String, GatewayEntry>,
    pub route_tables: Vec<RouteTableSpec>,
    /// Raw `ip rule` clauses, in declared order
    pub route_rules: Vec<String>,
    pub netzone_search_path: Vec<PathBuf>,
    pub firewall_script: Option<PathBuf>,
}

impl GatewayConfig {
    /// Validate the raw file. `builtin_netzones` is appended to the search path.
    pub fn from_toml(raw: TomlConfig, builtin_netzones: &Path) -> Result<Self, ConfigError> {
        warn_unknown_keys("gateway config", &raw.unknown);
        warn_unknown_keys("routing", &raw.routing.unknown);

        let mut interfaces = BTreeMap::new();
        for (name, config) in raw.interfaces {
            let interface = parse_interface(&name, config)?;
            interfaces.insert(name, interface);
        }

        let mut gateways = BTreeMap::new();
        for (name, config) in raw.gateways {
            let decl = parse_gateway(&name, config)?;
            gateways.insert(name.clone(), GatewayEntry { name, decl });
        }

        let mut seen = HashSet::new();
        let mut route_tables = Vec::with_capacity(raw.routing.tables.len());
        for table in raw.routing.tables {
            warn_unknown_keys(&format!("route table {}", table.name), &table.unknown);
            if table.name.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "routing.tables.name".to_string(),
                });
            }
            if !seen.insert(table.name.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "route table {} is declared more than once",
                    table.name
                )));
            }
            route_tables.push(RouteTableSpec {
                table: table.name,
                entries: table
                    .entries
                    .into_iter()
                    .map(|(target, gateway)| RouteEntrySpec { target, gateway })
                    .collect(),
            });
        }

        let mut netzone_search_path = raw.netzone_search_path;
        netzone_search_path.push(builtin_netzones.to_path_buf());

        Ok(Self {
            interfaces,
            gateways,
            route_tables,
            route_rules: raw.routing.rules,
            netzone_search_path,
            firewall_script: raw.firewall_script,
        })
    }
}

fn warn_unknown_keys(entity: &str, unknown: &UnknownKeys) {
    for key in unknown.keys() {
        warn!("Unknown configuration key in {}: {}", entity, key);
    }
}

fn parse_devgroup(interface: &str, value: TomlDevGroup) -> Result<u32, ConfigError> {
    match value {
        TomlDevGroup::Id(id) => Ok(id),
        TomlDevGroup::Name(name) => DEVGROUPS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, id)| *id)
            .ok_or(ConfigError::InvalidDevGroup {
                interface: interface.to_string(),
                value: name,
            }),
    }
}

/// Gateway addresses are plain ip addresses, never networks
fn parse_gateway_address(entity: &str, value: &str) -> Result<IpAddr, ConfigError> {
    value
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidGatewayAddress {
            entity: entity.to_string(),
            value: value.to_string(),
        })
}

fn parse_interface(name: &str, config: TomlInterface) -> Result<InterfaceConfig, ConfigError> {
    let entity = format!("interface {}", name);
    warn_unknown_keys(&entity, &config.unknown);

    let devgroup = config
        .devgroup
        .map(|value| parse_devgroup(name, value))
        .transpose()?;
    let gateway = config
        .gateway
        .as_deref()
        .map(|value| parse_gateway_address(&entity, value))
        .transpose()?;

    Ok(InterfaceConfig {
        name: name.to_string(),
        devgroup,
        gateway,
    })
}

fn parse_gateway(name: &str, config: TomlGateway) -> Result<GatewayDecl, ConfigError> {
    let entity = format!("gateway {}", name);
    warn_unknown_keys(&entity, &config.unknown);

    let exclusive = |first: &'static str, second: &'static str| ConfigError::ExclusiveFields {
        entity: entity.clone(),
        first,
        second,
    };

    if let Some(target) = config.link {
        if config.interface.is_some() {
            return Err(exclusive("link", "interface"));
        }
        if config.interfaces.is_some() {
            return Err(exclusive("link", "interfaces"));
        }
        if config.gateway.is_some() {
            return Err(exclusive("link", "gateway"));
        }
        return Ok(GatewayDecl::Alias(target));
    }

    if let Some(interfaces) = config.interfaces {
        if config.interface.is_some() {
            return Err(exclusive("interface", "interfaces"));
        }
        if config.gateway.is_some() {
            return Err(exclusive("gateway", "interfaces"));
        }
        if interfaces.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} declares an empty interfaces list",
                entity
            )));
        }
        return Ok(GatewayDecl::Multi(interfaces));
    }

    let gateway = config
        .gateway
        .as_deref()
        .map(|value| parse_gateway_address(&entity, value))
        .transpose()?;

    Ok(GatewayDecl::Single {
        interface: config.interface.unwrap_or_else(|| name.to_string()),
        gateway,
    })
}
