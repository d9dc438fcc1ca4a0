//! Centralized error types and handling

use std::path::PathBuf;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Network operation error: {0}")]
    Network(#[from] NetworkError),

    #[error("Route management error: {0}")]
    Route(#[from] RouteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not readable: {path}")]
    FileNotReadable { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("\"{first}\" and \"{second}\" can not be used together in {entity}")]
    ExclusiveFields {
        entity: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Invalid devgroup value for interface {interface}: {value}")]
    InvalidDevGroup { interface: String, value: String },

    #[error("Invalid gateway address for {entity} (must be a valid ip address): {value}")]
    InvalidGatewayAddress { entity: String, value: String },
}

/// Errors raised while building or resolving the gateway topology
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Gateway alias cycle detected: {}", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("Gateway {gateway} is an alias of unknown gateway {target}")]
    DanglingAlias { gateway: String, target: String },

    #[error("Failed to read netzone file {}: {source}", path.display())]
    NetZoneRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan netzone directory {}: {source}", path.display())]
    NetZoneScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Network operation errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Failed to open netlink connection: {0}")]
    ConnectionFailed(String),

    #[error("Failed to dump links: {0}")]
    LinkDump(String),
}

/// Route management errors
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}
