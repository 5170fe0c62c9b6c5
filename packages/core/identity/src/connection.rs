use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

use crate::{Flow, NodeId, NodePort, PortId};

/// Edge-to-edge routing request, flow-agnostic
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathConnection {
    pub entry: NodePort,
    pub exit: NodePort,
}

impl DatapathConnection {
    pub fn new(entry: NodePort, exit: NodePort) -> Self {
        Self { entry, exit }
    }

    pub fn of(entry_node: NodeId, entry_port: PortId, exit_node: NodeId, exit_port: PortId) -> Self {
        Self::new(NodePort::new(entry_node, entry_port), NodePort::new(exit_node, exit_port))
    }

    pub fn entry_node(&self) -> NodeId {
        self.entry.node
    }

    pub fn entry_port(&self) -> PortId {
        self.entry.port
    }

    pub fn exit_node(&self) -> NodeId {
        self.exit.node
    }

    pub fn exit_port(&self) -> PortId {
        self.exit.port
    }

    /// Entry and exit are on the same node, only the trivial route exists
    pub fn is_local(&self) -> bool {
        self.entry.node == self.exit.node
    }

    pub fn flowed(&self, flow: Flow) -> FlowedConnection {
        FlowedConnection::new(*self, flow)
    }
}

impl Display for DatapathConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} >> {}", self.entry, self.exit)
    }
}

impl Debug for DatapathConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Registration key for QoS routing: a connection restricted to one traffic class
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowedConnection {
    pub connection: DatapathConnection,
    pub flow: Flow,
}

impl FlowedConnection {
    pub fn new(connection: DatapathConnection, flow: Flow) -> Self {
        Self { connection, flow }
    }

    pub fn unflowed(&self) -> DatapathConnection {
        self.connection
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn entry_node(&self) -> NodeId {
        self.connection.entry_node()
    }

    pub fn exit_node(&self) -> NodeId {
        self.connection.exit_node()
    }
}

impl Display for FlowedConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.connection, self.flow)
    }
}

impl Debug for FlowedConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::DatapathConnection;
    use crate::{Flow, NodeId, PortId};

    #[test]
    fn flowed_round_trip() {
        let conn = DatapathConnection::of(NodeId::new(1), PortId::new(10), NodeId::new(3), PortId::new(20));
        let flowed = conn.flowed(Flow::all());
        assert_eq!(flowed.unflowed(), conn);
        assert_eq!(flowed.entry_node(), NodeId::new(1));
        assert_eq!(flowed.exit_node(), NodeId::new(3));
        assert!(!conn.is_local());
        assert_eq!(flowed.to_string(), "s1[10] >> s3[20] [*]");
    }
}
