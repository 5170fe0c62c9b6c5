use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

use crate::{DatapathConnection, DatapathLink, Flow, FlowedConnection, FlowedLink, NodeId, NodePort, PortId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path between different nodes {0} and {1}")]
    Empty(NodeId, NodeId),
    #[error("path must start at {expected} but first link starts at {actual}")]
    WrongEntry { expected: NodeId, actual: NodeId },
    #[error("path must end at {expected} but last link ends at {actual}")]
    WrongExit { expected: NodeId, actual: NodeId },
    #[error("link {link} does not continue from {prev}")]
    Disconnected { prev: DatapathLink, link: DatapathLink },
}

/// One traversed node, entered by `in_port` and left by `out_port`
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathHop {
    pub node: NodeId,
    pub in_port: PortId,
    pub out_port: PortId,
}

impl DatapathHop {
    pub fn new(node: NodeId, in_port: PortId, out_port: PortId) -> Self {
        Self { node, in_port, out_port }
    }
}

impl Display for DatapathHop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]{}[{}]", self.in_port, self.node, self.out_port)
    }
}

impl Debug for DatapathHop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Ordered hop sequence from entry to exit, it always has at least one hop.
///
/// A path of `n` hops traverses `n - 1` links.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathPath {
    hops: Vec<DatapathHop>,
    links: Vec<DatapathLink>,
}

impl DatapathPath {
    /// Builds the path serving `conn` over `links`, which must be contiguous, start at the entry node
    /// and end at the exit node. An empty link list is only valid for a local connection.
    pub fn from_links(conn: &DatapathConnection, links: &[DatapathLink]) -> Result<Self, PathError> {
        let (first, last) = match (links.first(), links.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                if conn.is_local() {
                    return Ok(Self {
                        hops: vec![DatapathHop::new(conn.entry_node(), conn.entry_port(), conn.exit_port())],
                        links: vec![],
                    });
                }
                return Err(PathError::Empty(conn.entry_node(), conn.exit_node()));
            }
        };

        if first.src_node() != conn.entry_node() {
            return Err(PathError::WrongEntry {
                expected: conn.entry_node(),
                actual: first.src_node(),
            });
        }
        if last.dest_node() != conn.exit_node() {
            return Err(PathError::WrongExit {
                expected: conn.exit_node(),
                actual: last.dest_node(),
            });
        }

        let mut hops = Vec::with_capacity(links.len() + 1);
        let mut in_port = conn.entry_port();
        for (i, link) in links.iter().enumerate() {
            if i > 0 && !link.succeeds(&links[i - 1]) {
                return Err(PathError::Disconnected { prev: links[i - 1], link: *link });
            }
            hops.push(DatapathHop::new(link.src_node(), in_port, link.src_port()));
            in_port = link.dest_port();
        }
        hops.push(DatapathHop::new(last.dest_node(), in_port, conn.exit_port()));

        Ok(Self { hops, links: links.to_vec() })
    }

    pub fn hops(&self) -> &[DatapathHop] {
        &self.hops
    }

    pub fn links(&self) -> &[DatapathLink] {
        &self.links
    }

    pub fn number_of_hops(&self) -> usize {
        self.hops.len()
    }

    pub fn number_of_links(&self) -> usize {
        self.links.len()
    }

    pub fn connection(&self) -> DatapathConnection {
        let first = self.hops[0];
        let last = self.hops[self.hops.len() - 1];
        DatapathConnection::new(NodePort::new(first.node, first.in_port), NodePort::new(last.node, last.out_port))
    }

    pub fn flowed(self, flow: Flow) -> FlowedPath {
        FlowedPath { path: self, flow }
    }
}

impl Display for DatapathPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, hop) in self.hops.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{}", hop)?;
        }
        Ok(())
    }
}

impl Debug for DatapathPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// A path carrying traffic of one flow
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowedPath {
    pub path: DatapathPath,
    pub flow: Flow,
}

impl FlowedPath {
    pub fn unflowed(&self) -> &DatapathPath {
        &self.path
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn connection(&self) -> FlowedConnection {
        self.path.connection().flowed(self.flow.clone())
    }

    pub fn flowed_links(&self) -> impl Iterator<Item = FlowedLink> + '_ {
        self.path.links().iter().map(|link| link.flowed(self.flow.clone()))
    }
}

impl Display for FlowedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.path, self.flow)
    }
}

impl Debug for FlowedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{DatapathHop, DatapathPath, PathError};
    use crate::{DatapathConnection, DatapathLink, NodeId, PortId};

    fn link(src: u64, src_port: u32, dest: u64, dest_port: u32) -> DatapathLink {
        DatapathLink::of(NodeId::new(src), PortId::new(src_port), NodeId::new(dest), PortId::new(dest_port))
    }

    fn conn(entry: u64, exit: u64) -> DatapathConnection {
        DatapathConnection::of(NodeId::new(entry), PortId::new(100), NodeId::new(exit), PortId::new(200))
    }

    #[test]
    fn build_hops_from_links() {
        let path = DatapathPath::from_links(&conn(1, 3), &[link(1, 1, 2, 1), link(2, 2, 3, 1)]).expect("should build");
        assert_eq!(
            path.hops(),
            &[
                DatapathHop::new(NodeId::new(1), PortId::new(100), PortId::new(1)),
                DatapathHop::new(NodeId::new(2), PortId::new(1), PortId::new(2)),
                DatapathHop::new(NodeId::new(3), PortId::new(1), PortId::new(200)),
            ]
        );
        assert_eq!(path.number_of_links(), 2);
        assert_eq!(path.connection(), conn(1, 3));
        assert_eq!(path.to_string(), "[100]s1[1] > [1]s2[2] > [1]s3[200]");
    }

    #[test]
    fn local_connection_has_trivial_path() {
        let path = DatapathPath::from_links(&conn(1, 1), &[]).expect("should build");
        assert_eq!(path.number_of_hops(), 1);
        assert_eq!(path.number_of_links(), 0);
        assert_eq!(path.connection(), conn(1, 1));
    }

    #[test]
    fn reject_invalid_links() {
        assert_eq!(DatapathPath::from_links(&conn(1, 3), &[]), Err(PathError::Empty(NodeId::new(1), NodeId::new(3))));
        assert!(matches!(DatapathPath::from_links(&conn(1, 3), &[link(2, 1, 3, 1)]), Err(PathError::WrongEntry { .. })));
        assert!(matches!(DatapathPath::from_links(&conn(1, 3), &[link(1, 1, 2, 1)]), Err(PathError::WrongExit { .. })));
        assert!(matches!(DatapathPath::from_links(&conn(1, 3), &[link(1, 1, 2, 1), link(4, 1, 3, 1)]), Err(PathError::Disconnected { .. })));
    }
}
