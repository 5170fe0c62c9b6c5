use te_sdn_identity::{BidiNodePorts, DatapathLink, PortId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("link {0} references a node that is not in the topology")]
    MissingEndpoint(DatapathLink),
    #[error("link {0} cannot be enabled, discovery is suppressed on port {1}")]
    SuppressedPort(BidiNodePorts, PortId),
}
