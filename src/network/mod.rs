//! Host network state
//!
//! Provides the snapshot of links present on the host, which the interface
//! registry merges with declared interface configuration.

use crate::error::NetworkError;

pub mod discovery;

/// One link as reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLink {
    pub name: String,
    pub index: u32,
    pub group: Option<u32>,
    /// Operational state, e.g. `up`, `down`, `unknown`
    pub operstate: Option<String>,
    /// Link kind, e.g. `bridge`, `vlan`, `tun`, `ppp`
    pub kind: Option<String>,
}

impl HostLink {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            group: None,
            operstate: None,
            kind: None,
        }
    }
}

/// Source of the host link snapshot
pub trait LinkSource {
    fn list_links(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<HostLink>, NetworkError>> + Send;
}

/// Fixed snapshot, used for tests and when the host is not consulted
#[derive(Debug, Clone, Default)]
pub struct StaticLinkSource {
    links: Vec<HostLink>,
}

impl StaticLinkSource {
    pub fn new(links: Vec<HostLink>) -> Self {
        Self { links }
    }
}

impl LinkSource for StaticLinkSource {
    async fn list_links(&self) -> Result<Vec<HostLink>, NetworkError> {
        Ok(self.links.clone())
    }
}
