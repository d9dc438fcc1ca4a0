//! Command-line argument parsing

use crate::config::AppConfig;
use crate::error::ConfigError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "gwtool")]
#[command(about = "Provision routing tables and rules of a Linux gateway")]
#[command(version)]
pub struct CliArgs {
    /// Gateway configuration file path
    #[arg(short, long, help = "Path to TOML gateway configuration file")]
    pub config: Option<PathBuf>,

    /// Workspace directory
    #[arg(short, long, help = "Instance workspace directory (default /opt/gateway)")]
    pub workspace: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, help = "Set the logging level")]
    pub log_level: Option<String>,

    /// Builtin data directory
    #[arg(long, help = "Directory holding builtin netzones and nftables scripts")]
    pub data_dir: Option<PathBuf>,

    /// Print commands instead of executing them
    #[arg(long, help = "Print the commands that would be run and exit")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply firewall and routing configuration
    Setup {
        #[arg(value_enum, default_value_t = SetupTarget::All)]
        target: SetupTarget,
    },
    /// Interface up hook: set the device group, then run a full setup
    Ifup {
        /// Interface name, falls back to the IFACE environment variable
        iface: Option<String>,
    },
    /// Print the resolved topology or route plan
    Show {
        #[arg(value_enum)]
        what: ShowTarget,
    },
    /// Validate the configuration and resolve every gateway
    Check,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTarget {
    Route,
    Firewall,
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    Interfaces,
    Gateways,
    Netzones,
    Plan,
}

impl CliArgs {
    /// Apply CLI arguments over base configuration
    pub fn apply_to_config(&self, mut base_config: AppConfig) -> Result<AppConfig, ConfigError> {
        if let Some(ref workspace) = self.workspace {
            base_config.workspace = workspace.clone();
        }

        if let Some(ref config) = self.config {
            base_config.config_file = Some(config.clone());
        }

        if let Some(ref level) = self.log_level {
            if level.trim().is_empty() {
                return Err(ConfigError::InvalidFormat(
                    "log level must not be empty".to_string(),
                ));
            }
            base_config.log_level = level.clone();
        }

        if let Some(ref data_dir) = self.data_dir {
            base_config.data_dir = data_dir.clone();
        }

        if self.dry_run {
            base_config.dry_run = true;
        }

        Ok(base_config)
    }
}
