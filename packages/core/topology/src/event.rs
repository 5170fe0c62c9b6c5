use serde::{Deserialize, Serialize};
use te_sdn_identity::{DatapathLink, NodeId, PortId};

use crate::TopologySnapshot;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    Added,
    Activated,
    Updated,
    Deactivated,
    Removed,
}

/// Events pushed by the discovery collaborator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    LinkAdded(DatapathLink),
    LinkUpdated(DatapathLink),
    LinkRemoved(DatapathLink),
    Port(NodeId, PortId, PortStatus),
}

/// Changes actually applied to the topology, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    LinkAdded(DatapathLink),
    LinkRemoved(DatapathLink),
    Port(NodeId, PortId, PortStatus),
}

impl TopologyEvent {
    /// Port events do not change connectivity
    pub fn changes_connectivity(&self) -> bool {
        !matches!(self, TopologyEvent::Port(..))
    }
}

/// Receives every applied topology change together with the snapshot taken right after it
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait TopologyListener: Send + Sync {
    fn on_topology_event(&self, event: &TopologyEvent, snapshot: &TopologySnapshot);
}
