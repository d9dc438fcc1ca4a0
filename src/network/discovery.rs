//! Host link discovery using rtnetlink

use crate::error::NetworkError;
use crate::network::{HostLink, LinkSource};
use futures_util::stream::TryStreamExt;
use rtnetlink::packet_route::link::{InfoKind, LinkAttribute, LinkInfo, LinkMessage};
use rtnetlink::{new_connection, Handle};
use tracing::debug;

/// Link source backed by a netlink route socket
pub struct RtNetlinkLinkSource {
    handle: Handle,
}

impl RtNetlinkLinkSource {
    /// Open a netlink connection, must be called within a tokio runtime
    pub fn new() -> Result<Self, NetworkError> {
        let (connection, handle, _) =
            new_connection().map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(connection);

        Ok(Self { handle })
    }
}

impl LinkSource for RtNetlinkLinkSource {
    async fn list_links(&self) -> Result<Vec<HostLink>, NetworkError> {
        let messages: Vec<LinkMessage> = self
            .handle
            .link()
            .get()
            .execute()
            .try_collect()
            .await
            .map_err(|e| NetworkError::LinkDump(e.to_string()))?;

        let links: Vec<HostLink> = messages.iter().filter_map(host_link_from_message).collect();
        debug!("Discovered {} links on host", links.len());
        Ok(links)
    }
}

/// Convert a netlink link message, links without a name are dropped
fn host_link_from_message(message: &LinkMessage) -> Option<HostLink> {
    let mut link = HostLink::new(String::new(), message.header.index);

    for attribute in &message.attributes {
        match attribute {
            LinkAttribute::IfName(name) => link.name = name.clone(),
            LinkAttribute::Group(group) => link.group = Some(*group),
            LinkAttribute::OperState(state) => {
                link.operstate = Some(format!("{:?}", state).to_lowercase())
            }
            LinkAttribute::LinkInfo(infos) => {
                link.kind = infos.iter().find_map(|info| match info {
                    LinkInfo::Kind(kind) => Some(kind_name(kind)),
                    _ => None,
                })
            }
            _ => {}
        }
    }

    if link.name.is_empty() {
        return None;
    }
    Some(link)
}

fn kind_name(kind: &InfoKind) -> String {
    match kind {
        InfoKind::Other(name) => name.clone(),
        other => format!("{:?}", other).to_lowercase(),
    }
}
