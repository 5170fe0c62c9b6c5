use std::path::Path;

use serde::Deserialize;
use te_sdn_identity::{DatapathLink, Flow, FlowedConnection, NodeId, PortId};
use te_sdn_qos_routing::{QosRoutingManager, RoutingConfig, RoutingError};
use te_sdn_stats::{FlowedLinkStats, InfoRate, Stat, StatType, Summary};
use te_sdn_topology::{TopologyError, TopologyGraph};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Replayable description of a network: the discovered topology, the registered connections,
/// then measurements, capacity overrides and link failures applied in that order
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: RoutingConfig,
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub links: Vec<ScenarioLink>,
    #[serde(default)]
    pub disabled_links: Vec<DatapathLink>,
    #[serde(default)]
    pub suppressed_ports: Vec<PortId>,
    #[serde(default)]
    pub connections: Vec<FlowedConnection>,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub virtual_capacities: Vec<VirtualCapacity>,
    #[serde(default)]
    pub failures: Vec<DatapathLink>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioLink {
    #[serde(flatten)]
    pub link: DatapathLink,
    /// Also adds the reversed link
    #[serde(default)]
    pub bidirectional: bool,
}

#[derive(Debug, Deserialize)]
pub struct Measurement {
    pub link: DatapathLink,
    #[serde(default)]
    pub flow: Flow,
    pub latency_ms: Option<f64>,
    pub byte_loss: Option<f64>,
    pub throughput_mbps: Option<f64>,
    pub capacity_mbps: Option<f64>,
    #[serde(default, rename = "unsafe")]
    pub is_unsafe: bool,
}

impl Measurement {
    pub fn to_stats(&self, timestamp_ms: u64) -> FlowedLinkStats {
        let kind = if self.is_unsafe {
            StatType::Unsafe
        } else {
            StatType::Safe
        };
        let mut stats = FlowedLinkStats::absent(self.link.flowed(self.flow.clone()));
        if let Some(ms) = self.latency_ms {
            stats = stats.with_latency(Stat::new(Some(Summary::single(ms)), timestamp_ms, kind));
        }
        if let Some(loss) = self.byte_loss {
            stats = stats.with_byte_loss(Stat::new(Some(Summary::single(loss)), timestamp_ms, kind));
        }
        if let Some(mbps) = self.throughput_mbps {
            stats = stats.with_throughput(Stat::new(Some(InfoRate::from_mbps(mbps)), timestamp_ms, kind));
        }
        if let Some(mbps) = self.capacity_mbps {
            stats = stats.with_data_capacity(Stat::new(Some(InfoRate::from_mbps(mbps)), timestamp_ms, kind));
        }
        stats
    }
}

#[derive(Debug, Deserialize)]
pub struct VirtualCapacity {
    pub link: DatapathLink,
    /// None clears the override
    pub mbps: Option<f64>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Feeds the scenario into the topology store and the routing manager, acting as the discovery
    /// and measurement collaborators
    pub fn replay(&self, topology: &TopologyGraph, manager: &QosRoutingManager, now_ms: u64) -> Result<(), ScenarioError> {
        for link in self.disabled_links.iter() {
            topology.disable_link(link.bidi());
        }
        for port in self.suppressed_ports.iter() {
            topology.suppress_link_discovery(*port);
        }
        for node in self.nodes.iter() {
            topology.add_node(*node);
        }
        for entry in self.links.iter() {
            let mut links = vec![entry.link];
            if entry.bidirectional {
                links.push(entry.link.reversed());
            }
            for link in links {
                if topology.is_link_suppressed(&link) {
                    log::info!("[Scenario] link {} is administratively down, not adding it", link);
                    continue;
                }
                topology.add_link(link)?;
            }
        }

        for connection in self.connections.iter() {
            manager.register_connection(connection.clone())?;
        }
        for measurement in self.measurements.iter() {
            manager.on_link_stats_updated(measurement.to_stats(now_ms))?;
        }
        for capacity in self.virtual_capacities.iter() {
            manager.update_virtual_capacity(capacity.link, capacity.mbps.map(InfoRate::from_mbps))?;
        }
        for link in self.failures.iter() {
            if !topology.remove_link(link) {
                log::warn!("[Scenario] failed link {} was not in the topology", link);
            }
        }
        Ok(())
    }
}
