//! Gateway graph
//!
//! Gateways are named next hops. A gateway either aliases another gateway,
//! wraps a single interface, or fans out over several interfaces. Every
//! interface without a declared gateway of the same name gets an implicit
//! single-interface gateway.
//!
//! Resolution follows alias chains down to a non-alias gateway and is
//! memoized per gateway. The chain walked so far is threaded through the
//! recursion, so a cycle is reported instead of recursing forever.

use crate::config::{GatewayDecl, GatewayEntry};
use crate::error::TopologyError;
use crate::topology::interface::{Interface, InterfaceRegistry};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

/// One hop of a route: `[via <addr>] dev <if>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub device: String,
    pub via: Option<IpAddr>,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.via {
            Some(via) => write!(f, "via {} dev {}", via, self.device),
            None => write!(f, "dev {}", self.device),
        }
    }
}

/// Next hop of a resolved gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextHop {
    Single(Hop),
    /// Multipath route, member order is kept as declared
    Multi(Vec<Hop>),
}

impl NextHop {
    pub fn interfaces(&self) -> Vec<&str> {
        match self {
            NextHop::Single(hop) => vec![hop.device.as_str()],
            NextHop::Multi(hops) => hops.iter().map(|hop| hop.device.as_str()).collect(),
        }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHop::Single(hop) => write!(f, "{}", hop),
            NextHop::Multi(hops) => {
                for (i, hop) in hops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "nexthop {}", hop)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of resolving a gateway through its alias chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Name of the non-alias gateway the chain ended at
    pub target: String,
    /// All interfaces involved exist on the host
    pub available: bool,
    pub next_hop: NextHop,
}

impl Resolution {
    /// Literal next-hop fragment used in `ip route replace`
    pub fn next_hop_spec(&self) -> String {
        self.next_hop.to_string()
    }

    /// Next-hop fragment with the gateway address replaced. Multipath
    /// gateways carry one address per member and ignore the override.
    pub fn next_hop_spec_via(&self, via: Option<IpAddr>) -> String {
        match (&self.next_hop, via) {
            (NextHop::Single(hop), Some(via)) => Hop {
                device: hop.device.clone(),
                via: Some(via),
            }
            .to_string(),
            _ => self.next_hop_spec(),
        }
    }
}

/// A gateway node
#[derive(Debug)]
pub struct Gateway {
    name: String,
    decl: GatewayDecl,
    user_configured: bool,
    resolved: OnceCell<Resolution>,
}

impl Gateway {
    fn new(name: String, decl: GatewayDecl, user_configured: bool) -> Self {
        debug!(
            "Loaded gateway: <Gateway name={} config={}>",
            name,
            if user_configured { "yes" } else { "no" }
        );
        Self {
            name,
            decl,
            user_configured,
            resolved: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decl(&self) -> &GatewayDecl {
        &self.decl
    }

    pub fn user_configured(&self) -> bool {
        self.user_configured
    }

    /// Alias target, if this gateway is an alias
    pub fn link(&self) -> Option<&str> {
        match &self.decl {
            GatewayDecl::Alias(target) => Some(target),
            _ => None,
        }
    }
}

/// All gateways of a run, owning the interface registry they resolve against
#[derive(Debug)]
pub struct GatewayGraph {
    gateways: BTreeMap<String, Gateway>,
    interfaces: InterfaceRegistry,
}

impl GatewayGraph {
    /// Build the graph. Dangling alias targets and alias cycles are rejected here.
    pub fn build(
        declared: &BTreeMap<String, GatewayEntry>,
        interfaces: InterfaceRegistry,
    ) -> Result<Self, TopologyError> {
        let mut gateways = BTreeMap::new();

        for entry in declared.values() {
            gateways.insert(
                entry.name.clone(),
                Gateway::new(entry.name.clone(), entry.decl.clone(), true),
            );
        }

        for interface in interfaces.iter() {
            if gateways.contains_key(interface.name()) {
                continue;
            }
            let decl = GatewayDecl::Single {
                interface: interface.name().to_string(),
                gateway: None,
            };
            gateways.insert(
                interface.name().to_string(),
                Gateway::new(interface.name().to_string(), decl, false),
            );
        }

        let graph = Self {
            gateways,
            interfaces,
        };
        graph.check_aliases()?;
        Ok(graph)
    }

    /// Walk every alias chain once without resolving anything
    fn check_aliases(&self) -> Result<(), TopologyError> {
        for (name, gateway) in &self.gateways {
            let mut chain = vec![name.clone()];
            let mut current = gateway;

            while let Some(target) = current.link() {
                if chain.iter().any(|seen| seen == target) {
                    chain.push(target.to_string());
                    return Err(TopologyError::AliasCycle { chain });
                }
                current = self
                    .gateways
                    .get(target)
                    .ok_or_else(|| TopologyError::DanglingAlias {
                        gateway: current.name.clone(),
                        target: target.to_string(),
                    })?;
                chain.push(target.to_string());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Gateway> {
        self.gateways.get(name)
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    /// Gateways sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Gateway> {
        self.gateways.values()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    /// Resolve a gateway by name; `Ok(None)` when no such gateway exists
    pub fn resolve(&self, name: &str) -> Result<Option<&Resolution>, TopologyError> {
        let mut path = Vec::new();
        self.resolve_in(name, &mut path)
    }

    /// Availability of a gateway, `Ok(None)` when no such gateway exists
    pub fn available(&self, name: &str) -> Result<Option<bool>, TopologyError> {
        Ok(self.resolve(name)?.map(|resolution| resolution.available))
    }

    fn resolve_in(
        &self,
        name: &str,
        path: &mut Vec<String>,
    ) -> Result<Option<&Resolution>, TopologyError> {
        let Some(gateway) = self.gateways.get(name) else {
            return Ok(None);
        };
        if let Some(resolved) = gateway.resolved.get() {
            return Ok(Some(resolved));
        }
        if path.iter().any(|seen| seen == name) {
            let mut chain = path.clone();
            chain.push(name.to_string());
            return Err(TopologyError::AliasCycle { chain });
        }

        path.push(name.to_string());
        let resolution = match &gateway.decl {
            GatewayDecl::Alias(target) => match self.resolve_in(target, path)? {
                Some(resolved) => resolved.clone(),
                None => {
                    return Err(TopologyError::DanglingAlias {
                        gateway: name.to_string(),
                        target: target.clone(),
                    })
                }
            },
            GatewayDecl::Single { interface, gateway } => {
                self.resolve_single(name, interface, *gateway)
            }
            GatewayDecl::Multi(interfaces) => self.resolve_multi(name, interfaces),
        };
        path.pop();

        debug!(
            "Resolved gateway {} -> {} available={}",
            name, resolution.next_hop, resolution.available
        );
        Ok(Some(gateway.resolved.get_or_init(|| resolution)))
    }

    fn lookup_interface(&self, gateway: &str, name: &str) -> Option<&Interface> {
        let interface = self.interfaces.get(name);
        if interface.is_none() {
            debug!("Gateway {} refers to unknown interface {}", gateway, name);
        }
        interface
    }

    fn resolve_single(&self, name: &str, ifname: &str, gateway: Option<IpAddr>) -> Resolution {
        let interface = self.lookup_interface(name, ifname);
        // the gateway's own address takes precedence over the interface's
        let via = gateway.or_else(|| interface.and_then(Interface::gateway));

        Resolution {
            target: name.to_string(),
            available: interface.is_some_and(Interface::exists),
            next_hop: NextHop::Single(Hop {
                device: ifname.to_string(),
                via,
            }),
        }
    }

    fn resolve_multi(&self, name: &str, ifnames: &[String]) -> Resolution {
        let mut available = true;
        let mut hops = Vec::with_capacity(ifnames.len());

        for ifname in ifnames {
            let interface = self.lookup_interface(name, ifname);
            available &= interface.is_some_and(Interface::exists);
            hops.push(Hop {
                device: ifname.clone(),
                via: interface.and_then(Interface::gateway),
            });
        }

        Resolution {
            target: name.to_string(),
            available,
            next_hop: NextHop::Multi(hops),
        }
    }
}
