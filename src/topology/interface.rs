//! Interface registry: host links merged with declared interface configuration

use crate::config::InterfaceConfig;
use crate::network::HostLink;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, warn};

/// One network link, discovered on the host, declared in configuration, or both
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    link: Option<HostLink>,
    config: Option<InterfaceConfig>,
}

impl Interface {
    fn discovered(link: HostLink, config: Option<InterfaceConfig>) -> Self {
        Self {
            name: link.name.clone(),
            link: Some(link),
            config,
        }
    }

    fn declared(config: InterfaceConfig) -> Self {
        Self {
            name: config.name.clone(),
            link: None,
            config: Some(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Present on the host
    pub fn exists(&self) -> bool {
        self.link.is_some()
    }

    pub fn user_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn index(&self) -> Option<u32> {
        self.link.as_ref().map(|link| link.index)
    }

    /// Device group currently set on the host
    pub fn devgroup(&self) -> Option<u32> {
        self.link.as_ref().and_then(|link| link.group)
    }

    pub fn operstate(&self) -> Option<&str> {
        self.link.as_ref().and_then(|link| link.operstate.as_deref())
    }

    pub fn link_kind(&self) -> Option<&str> {
        self.link.as_ref().and_then(|link| link.kind.as_deref())
    }

    pub fn config(&self) -> Option<&InterfaceConfig> {
        self.config.as_ref()
    }

    /// Device group requested by configuration
    pub fn configured_devgroup(&self) -> Option<u32> {
        self.config.as_ref().and_then(|config| config.devgroup)
    }

    /// Gateway address declared on the interface
    pub fn gateway(&self) -> Option<IpAddr> {
        self.config.as_ref().and_then(|config| config.gateway)
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self
            .index()
            .map(|index| index.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "<Interface ifname={} index={} operstate={} kind={} config={}>",
            self.name,
            index,
            self.operstate().unwrap_or("-"),
            self.link_kind().unwrap_or("-"),
            if self.user_configured() { "yes" } else { "no" }
        )
    }
}

/// All interfaces known in this run. Only obtainable fully built.
#[derive(Debug, Clone)]
pub struct InterfaceRegistry {
    interfaces: HashMap<String, Interface>,
    /// Host links first in kernel order, then declared-only interfaces by name
    order: Vec<String>,
}

impl InterfaceRegistry {
    pub fn build(host_links: Vec<HostLink>, declared: &BTreeMap<String, InterfaceConfig>) -> Self {
        let mut registry = Self {
            interfaces: HashMap::new(),
            order: Vec::new(),
        };

        for link in host_links {
            if registry.interfaces.contains_key(&link.name) {
                warn!("Duplicate host link ignored: {}", link.name);
                continue;
            }
            let config = declared.get(&link.name).cloned();
            registry.insert(Interface::discovered(link, config));
        }

        for (name, config) in declared {
            if registry.interfaces.contains_key(name) {
                continue;
            }
            // e.g. a ppp link that is not up yet
            warn!("Link not found for user configured interface: {}", name);
            registry.insert(Interface::declared(config.clone()));
        }

        registry
    }

    fn insert(&mut self, interface: Interface) {
        debug!("Loaded interface: {}", interface);
        self.order.push(interface.name.clone());
        self.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    /// True only for interfaces present on the host
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some_and(Interface::exists)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.order.iter().filter_map(|name| self.interfaces.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(entries: &[(&str, Option<u32>, Option<&str>)]) -> BTreeMap<String, InterfaceConfig> {
        entries
            .iter()
            .map(|(name, devgroup, gateway)| {
                (
                    name.to_string(),
                    InterfaceConfig {
                        name: name.to_string(),
                        devgroup: *devgroup,
                        gateway: gateway.map(|g| g.parse().unwrap()),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_host_links_merged_with_config() {
        let mut eth0 = HostLink::new("eth0", 2);
        eth0.group = Some(1);
        eth0.operstate = Some("up".to_string());
        let links = vec![HostLink::new("lo", 1), eth0];
        let config = declared(&[("eth0", Some(1), Some("203.0.113.1"))]);

        let registry = InterfaceRegistry::build(links, &config);

        let eth0 = registry.get("eth0").unwrap();
        assert!(eth0.exists());
        assert!(eth0.user_configured());
        assert_eq!(eth0.index(), Some(2));
        assert_eq!(eth0.devgroup(), Some(1));
        assert_eq!(eth0.operstate(), Some("up"));
        assert_eq!(eth0.gateway(), Some("203.0.113.1".parse().unwrap()));

        let lo = registry.get("lo").unwrap();
        assert!(lo.exists());
        assert!(!lo.user_configured());
        assert_eq!(lo.gateway(), None);
    }

    #[test]
    fn test_declared_interface_missing_on_host() {
        let config = declared(&[("ppp0", Some(4), None)]);
        let registry = InterfaceRegistry::build(vec![HostLink::new("eth0", 2)], &config);

        let ppp0 = registry.get("ppp0").unwrap();
        assert!(!ppp0.exists());
        assert!(ppp0.user_configured());
        assert_eq!(ppp0.index(), None);
        assert_eq!(ppp0.configured_devgroup(), Some(4));
        assert!(!registry.exists("ppp0"));
        assert!(registry.exists("eth0"));
    }

    #[test]
    fn test_unknown_interface_is_absent() {
        let registry = InterfaceRegistry::build(vec![], &BTreeMap::new());
        assert!(registry.get("eth9").is_none());
        assert!(!registry.exists("eth9"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iteration_order() {
        let config = declared(&[("wg0", None, None), ("ppp0", None, None), ("eth1", None, None)]);
        let links = vec![HostLink::new("eth1", 3), HostLink::new("eth0", 2)];

        let registry = InterfaceRegistry::build(links, &config);
        let names: Vec<_> = registry.iter().map(Interface::name).collect();

        assert_eq!(names, vec!["eth1", "eth0", "ppp0", "wg0"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_duplicate_host_link_keeps_first() {
        let links = vec![HostLink::new("eth0", 2), HostLink::new("eth0", 7)];
        let registry = InterfaceRegistry::build(links, &BTreeMap::new());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("eth0").unwrap().index(), Some(2));
    }

    #[test]
    fn test_empty_snapshot_builds_empty_registry() {
        let registry = InterfaceRegistry::build(Vec::new(), &BTreeMap::new());

        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
        assert!(!registry.exists("eth0"));
    }
}
