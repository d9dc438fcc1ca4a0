//! gwtool - Linux gateway provisioning
//!
//! Resolves declared interfaces, gateways and netzones against the links
//! present on the host, and turns custom route tables and policy rules into
//! `ip` commands.

pub mod commands;
pub mod config;
pub mod error;
pub mod network;
pub mod routing;
pub mod topology;

pub use error::AppError;
