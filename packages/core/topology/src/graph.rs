use std::collections::{BTreeMap, BTreeSet};

use te_sdn_identity::{DatapathLink, NodeId};

use crate::TopologyError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NodeLinks {
    outgoing: BTreeSet<DatapathLink>,
    incoming: BTreeSet<DatapathLink>,
}

/// Directed multigraph of switches and the links between them.
///
/// Every link endpoint is always present as a node. Parallel links and self-loops are kept as
/// distinct edges. Cloning produces a deep copy that is independent from the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatapathTopology {
    nodes: BTreeMap<NodeId, NodeLinks>,
    links: BTreeSet<DatapathLink>,
}

impl DatapathTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the node was already present
    pub fn add_node(&mut self, node: NodeId) -> bool {
        if self.nodes.contains_key(&node) {
            return false;
        }
        self.nodes.insert(node, NodeLinks::default());
        true
    }

    /// Removes the node with all incident links, returning the removed links or None if the node was unknown
    pub fn remove_node(&mut self, node: NodeId) -> Option<Vec<DatapathLink>> {
        let entry = self.nodes.remove(&node)?;
        let incident: BTreeSet<DatapathLink> = entry.outgoing.union(&entry.incoming).copied().collect();
        for link in incident.iter() {
            self.links.remove(link);
            if let Some(other) = self.nodes.get_mut(&link.dest_node()) {
                other.incoming.remove(link);
            }
            if let Some(other) = self.nodes.get_mut(&link.src_node()) {
                other.outgoing.remove(link);
            }
        }
        Some(incident.into_iter().collect())
    }

    /// Returns Ok(false) if the link was already present, and an error if an endpoint is not a node
    pub fn add_link(&mut self, link: DatapathLink) -> Result<bool, TopologyError> {
        if !self.nodes.contains_key(&link.src_node()) || !self.nodes.contains_key(&link.dest_node()) {
            return Err(TopologyError::MissingEndpoint(link));
        }
        if !self.links.insert(link) {
            return Ok(false);
        }
        if let Some(src) = self.nodes.get_mut(&link.src_node()) {
            src.outgoing.insert(link);
        }
        if let Some(dest) = self.nodes.get_mut(&link.dest_node()) {
            dest.incoming.insert(link);
        }
        Ok(true)
    }

    /// Returns false if the link was not present
    pub fn remove_link(&mut self, link: &DatapathLink) -> bool {
        if !self.links.remove(link) {
            return false;
        }
        if let Some(src) = self.nodes.get_mut(&link.src_node()) {
            src.outgoing.remove(link);
        }
        if let Some(dest) = self.nodes.get_mut(&link.dest_node()) {
            dest.incoming.remove(link);
        }
        true
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn contains_link(&self, link: &DatapathLink) -> bool {
        self.links.contains(link)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn links(&self) -> impl Iterator<Item = &DatapathLink> + '_ {
        self.links.iter()
    }

    /// Links leaving `node`, empty if the node is unknown
    pub fn out_links(&self, node: NodeId) -> impl Iterator<Item = &DatapathLink> + '_ {
        self.nodes.get(&node).into_iter().flat_map(|n| n.outgoing.iter())
    }

    /// Links entering `node`, empty if the node is unknown
    pub fn in_links(&self, node: NodeId) -> impl Iterator<Item = &DatapathLink> + '_ {
        self.nodes.get(&node).into_iter().flat_map(|n| n.incoming.iter())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks that every link endpoint is a node and the adjacency sets agree with the link set
    pub fn is_consistent(&self) -> bool {
        let endpoints_ok = self.links.iter().all(|l| {
            let src_ok = self.nodes.get(&l.src_node()).map(|n| n.outgoing.contains(l)).unwrap_or(false);
            let dest_ok = self.nodes.get(&l.dest_node()).map(|n| n.incoming.contains(l)).unwrap_or(false);
            src_ok && dest_ok
        });
        let adjacency_ok = self.nodes.values().all(|n| n.outgoing.iter().chain(n.incoming.iter()).all(|l| self.links.contains(l)));
        endpoints_ok && adjacency_ok
    }
}
