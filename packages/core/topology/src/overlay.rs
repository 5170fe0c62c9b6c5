use std::collections::BTreeSet;

use te_sdn_identity::{BidiNodePorts, DatapathLink, PortId};

use crate::TopologyError;

/// Operator controlled state layered over the discovered topology.
///
/// Holds administratively disabled bidirectional links and ports on which link discovery is suppressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminOverlay {
    disabled: BTreeSet<BidiNodePorts>,
    suppressed_ports: BTreeSet<PortId>,
}

impl AdminOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the link was enabled before this call
    pub fn disable_link(&mut self, link: BidiNodePorts) -> bool {
        self.disabled.insert(link)
    }

    /// Returns true if the link was disabled before this call.
    ///
    /// Rejected when one of the ports has link discovery suppressed, leaving the state unchanged.
    pub fn enable_link(&mut self, link: BidiNodePorts) -> Result<bool, TopologyError> {
        if let Some(port) = [BidiNodePorts::min(&link).port, BidiNodePorts::max(&link).port].into_iter().find(|p| self.suppressed_ports.contains(p)) {
            return Err(TopologyError::SuppressedPort(link, port));
        }
        Ok(self.disabled.remove(&link))
    }

    /// Returns true if the port was not suppressed before this call
    pub fn suppress_link_discovery(&mut self, port: PortId) -> bool {
        self.suppressed_ports.insert(port)
    }

    pub fn is_disabled(&self, link: &BidiNodePorts) -> bool {
        self.disabled.contains(link)
    }

    pub fn is_port_suppressed(&self, port: PortId) -> bool {
        self.suppressed_ports.contains(&port)
    }

    /// True if a discovered link should not be reflected as active
    pub fn is_link_suppressed(&self, link: &DatapathLink) -> bool {
        self.is_port_suppressed(link.src_port()) || self.is_port_suppressed(link.dest_port()) || self.is_disabled(&link.bidi())
    }

    pub fn disabled_links(&self) -> &BTreeSet<BidiNodePorts> {
        &self.disabled
    }

    pub fn suppressed_ports(&self) -> &BTreeSet<PortId> {
        &self.suppressed_ports
    }
}
