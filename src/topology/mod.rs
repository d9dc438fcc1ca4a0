//! Gateway topology
//!
//! Netzones, interfaces and gateways of one run, built once and then only
//! queried. Each run constructs its own [`TopologyContext`]; nothing is
//! shared between runs.

use crate::config::GatewayConfig;
use crate::error::TopologyError;
use crate::network::HostLink;

pub mod gateway;
pub mod interface;
pub mod netzone;

pub use gateway::{Gateway, GatewayGraph, Hop, NextHop, Resolution};
pub use interface::{Interface, InterfaceRegistry};
pub use netzone::{NetZone, NetZoneCatalog};

/// Everything the route planner resolves against
#[derive(Debug)]
pub struct TopologyContext {
    pub netzones: NetZoneCatalog,
    pub gateways: GatewayGraph,
}

impl TopologyContext {
    /// Build catalog, registry and graph from configuration and the host link snapshot
    pub fn build(config: &GatewayConfig, host_links: Vec<HostLink>) -> Result<Self, TopologyError> {
        let interfaces = InterfaceRegistry::build(host_links, &config.interfaces);
        let gateways = GatewayGraph::build(&config.gateways, interfaces)?;
        let netzones = NetZoneCatalog::load(&config.netzone_search_path)?;

        Ok(Self { netzones, gateways })
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        self.gateways.interfaces()
    }

    /// Resolve every gateway, surfacing any resolution error
    pub fn resolve_all(&self) -> Result<(), TopologyError> {
        for gateway in self.gateways.iter() {
            self.gateways.resolve(gateway.name())?;
        }
        Ok(())
    }
}
