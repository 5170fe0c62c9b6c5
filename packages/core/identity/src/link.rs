use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

use crate::{Flow, NodeId, NodePort, PortId};

/// Directed, flow-agnostic link between two node ports.
///
/// Parallel links between the same pair of nodes are distinct as long as their ports differ,
/// and self-loops (same source and destination node) are allowed.
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathLink {
    pub src: NodePort,
    pub dest: NodePort,
}

impl DatapathLink {
    pub fn new(src: NodePort, dest: NodePort) -> Self {
        Self { src, dest }
    }

    pub fn of(src_node: NodeId, src_port: PortId, dest_node: NodeId, dest_port: PortId) -> Self {
        Self::new(NodePort::new(src_node, src_port), NodePort::new(dest_node, dest_port))
    }

    pub fn src_node(&self) -> NodeId {
        self.src.node
    }

    pub fn src_port(&self) -> PortId {
        self.src.port
    }

    pub fn dest_node(&self) -> NodeId {
        self.dest.node
    }

    pub fn dest_port(&self) -> PortId {
        self.dest.port
    }

    pub fn is_self_loop(&self) -> bool {
        self.src.node == self.dest.node
    }

    pub fn is_incident_to(&self, node: NodeId) -> bool {
        self.src.node == node || self.dest.node == node
    }

    /// True if this link starts at the node where `prev` ends
    pub fn succeeds(&self, prev: &DatapathLink) -> bool {
        self.src.node == prev.dest.node
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.dest, self.src)
    }

    pub fn bidi(&self) -> BidiNodePorts {
        BidiNodePorts::of(self.src, self.dest)
    }

    pub fn flowed(&self, flow: Flow) -> FlowedLink {
        FlowedLink::new(*self, flow)
    }
}

impl Display for DatapathLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} > {}", self.src, self.dest)
    }
}

impl Debug for DatapathLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Undirected pair of node ports, always stored with `min <= max`
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BidiNodePorts {
    min: NodePort,
    max: NodePort,
}

impl BidiNodePorts {
    pub fn of(a: NodePort, b: NodePort) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn min(&self) -> NodePort {
        self.min
    }

    pub fn max(&self) -> NodePort {
        self.max
    }

    pub fn contains_port(&self, port: PortId) -> bool {
        self.min.port == port || self.max.port == port
    }

    /// Both directed links that this pair covers
    pub fn links(&self) -> [DatapathLink; 2] {
        [DatapathLink::new(self.min, self.max), DatapathLink::new(self.max, self.min)]
    }
}

impl Display for BidiNodePorts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

impl Debug for BidiNodePorts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// A link scoped to a traffic class
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowedLink {
    pub link: DatapathLink,
    pub flow: Flow,
}

impl FlowedLink {
    pub fn new(link: DatapathLink, flow: Flow) -> Self {
        Self { link, flow }
    }

    pub fn unflowed(&self) -> DatapathLink {
        self.link
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }
}

impl Display for FlowedLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.link, self.flow)
    }
}

impl Debug for FlowedLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{BidiNodePorts, DatapathLink};
    use crate::{NodeId, NodePort, PortId};

    fn np(node: u64, port: u32) -> NodePort {
        NodePort::new(NodeId::new(node), PortId::new(port))
    }

    #[test]
    fn bidi_is_order_independent() {
        let a = BidiNodePorts::of(np(1, 1), np(2, 1));
        let b = BidiNodePorts::of(np(2, 1), np(1, 1));
        assert_eq!(a, b);
        assert_eq!(BidiNodePorts::min(&a), np(1, 1));
        assert_eq!(BidiNodePorts::max(&a), np(2, 1));
        assert_eq!(DatapathLink::new(np(2, 1), np(1, 1)).bidi(), a);
    }

    #[test]
    fn succeeds() {
        let l1 = DatapathLink::new(np(1, 1), np(2, 1));
        let l2 = DatapathLink::new(np(2, 2), np(3, 1));
        assert!(l2.succeeds(&l1));
        assert!(!l1.succeeds(&l2));
    }

    #[test]
    fn parallel_links_are_distinct() {
        let l1 = DatapathLink::new(np(1, 1), np(2, 1));
        let l2 = DatapathLink::new(np(1, 2), np(2, 2));
        assert_ne!(l1, l2);
        assert!(DatapathLink::new(np(1, 1), np(1, 2)).is_self_loop());
    }

    #[test]
    fn display() {
        assert_eq!(DatapathLink::new(np(1, 1), np(2, 3)).to_string(), "s1[1] > s2[3]");
        assert_eq!(BidiNodePorts::of(np(2, 3), np(1, 1)).to_string(), "s1[1] - s2[3]");
    }
}
