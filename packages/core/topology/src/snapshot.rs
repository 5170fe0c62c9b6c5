use std::collections::BTreeSet;
use std::sync::Arc;

use te_sdn_identity::{BidiNodePorts, DatapathLink};

use crate::DatapathTopology;

/// Immutable view of the topology and the disabled links, taken at a single point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    version: u64,
    graph: Arc<DatapathTopology>,
    disabled_links: Arc<BTreeSet<BidiNodePorts>>,
}

impl TopologySnapshot {
    pub fn new(version: u64, graph: DatapathTopology, disabled_links: BTreeSet<BidiNodePorts>) -> Self {
        Self {
            version,
            graph: Arc::new(graph),
            disabled_links: Arc::new(disabled_links),
        }
    }

    /// Number of state changes applied before this snapshot was taken, newer snapshots have larger versions
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph(&self) -> &Arc<DatapathTopology> {
        &self.graph
    }

    pub fn disabled_links(&self) -> &BTreeSet<BidiNodePorts> {
        &self.disabled_links
    }

    pub fn is_link_disabled(&self, link: &DatapathLink) -> bool {
        self.disabled_links.contains(&link.bidi())
    }
}
