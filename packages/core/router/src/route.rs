use std::fmt::{Display, Formatter};

use sha1::{Digest, Sha1};
use te_sdn_identity::{DatapathLink, DatapathPath, Flow, FlowedConnection, FlowedPath};
use te_sdn_stats::{FlowedLinkStats, InfoRate, Stat, StatType};

use crate::RouteError;

/// A flowed path annotated with the statistics of each link and their end-to-end aggregates.
///
/// Aggregates are folded left to right, each step combining trust tags and keeping the latest timestamp:
/// - latency is the sum of the hop mean latencies (ms), unknown if any hop is unknown
/// - byte loss is `1 - prod(1 - loss)`, unknown if any hop is unknown
/// - throughput is the max over hops that report one
/// - data capacity is the min over hops that report one
#[derive(Debug, Clone, PartialEq)]
pub struct FlowedRoute {
    path: FlowedPath,
    link_stats: Vec<FlowedLinkStats>,
    weight: f64,
    latency: Stat<Option<f64>>,
    byte_loss: Stat<Option<f64>>,
    throughput: Stat<Option<InfoRate>>,
    data_capacity: Stat<Option<InfoRate>>,
}

impl FlowedRoute {
    pub fn builder(connection: FlowedConnection) -> FlowedRouteBuilder {
        FlowedRouteBuilder {
            connection,
            links: vec![],
            link_stats: vec![],
            weight: 0.0,
        }
    }

    pub fn path(&self) -> &FlowedPath {
        &self.path
    }

    pub fn datapath_path(&self) -> &DatapathPath {
        self.path.unflowed()
    }

    pub fn flow(&self) -> &Flow {
        self.path.flow()
    }

    pub fn connection(&self) -> FlowedConnection {
        self.path.connection()
    }

    pub fn links(&self) -> &[DatapathLink] {
        self.path.unflowed().links()
    }

    pub fn number_of_links(&self) -> usize {
        self.link_stats.len()
    }

    pub fn link_stats(&self) -> &[FlowedLinkStats] {
        &self.link_stats
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// End-to-end latency in milliseconds
    pub fn latency(&self) -> &Stat<Option<f64>> {
        &self.latency
    }

    pub fn byte_loss(&self) -> &Stat<Option<f64>> {
        &self.byte_loss
    }

    pub fn throughput(&self) -> &Stat<Option<InfoRate>> {
        &self.throughput
    }

    pub fn data_capacity(&self) -> &Stat<Option<InfoRate>> {
        &self.data_capacity
    }

    pub fn available_bandwidth(&self) -> Stat<Option<InfoRate>> {
        self.data_capacity.combine(&self.throughput, |capa, used| match (capa, used) {
            (Some(capa), Some(used)) => Some(capa.pos_diff(*used)),
            _ => None,
        })
    }

    pub fn data_utilization(&self) -> Stat<Option<f64>> {
        self.data_capacity.combine(&self.throughput, |capa, used| match (capa, used) {
            (Some(capa), Some(used)) => used.ratio_of(*capa),
            _ => None,
        })
    }

    /// Identifier of the traversed links, unchanged by statistics-only updates.
    ///
    /// First 8 bytes (big-endian) of the SHA-1 over every link's source node, source port,
    /// destination node and destination port.
    pub fn path_id(&self) -> u64 {
        let mut hasher = Sha1::new();
        for link in self.links() {
            hasher.update(link.src_node().dpid().to_be_bytes());
            hasher.update(link.src_port().number().to_be_bytes());
            hasher.update(link.dest_node().dpid().to_be_bytes());
            hasher.update(link.dest_port().number().to_be_bytes());
        }
        let digest = hasher.finalize();
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(id)
    }

    pub fn has_same_path(&self, other: &Self) -> bool {
        self.path == other.path
    }

    /// Compares the four aggregates, ignoring timestamps
    pub fn has_same_core_stats(&self, other: &Self) -> bool {
        self.latency == other.latency && self.byte_loss == other.byte_loss && self.throughput == other.throughput && self.data_capacity == other.data_capacity
    }

    pub fn has_same_link_core_stats(&self, other: &Self) -> bool {
        self.link_stats.len() == other.link_stats.len() && self.link_stats.iter().zip(other.link_stats.iter()).all(|(a, b)| a.has_same_core_stats(b))
    }
}

impl Display for FlowedRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FlowedRoute{{path_id={:x}, flow={}, connection={}, weight={:.3}, path={}}}",
            self.path_id(),
            self.flow(),
            self.connection().connection,
            self.weight,
            self.path.unflowed()
        )
    }
}

/// Collects the links of a route one by one, checking that they form a contiguous path of one flow
pub struct FlowedRouteBuilder {
    connection: FlowedConnection,
    links: Vec<DatapathLink>,
    link_stats: Vec<FlowedLinkStats>,
    weight: f64,
}

impl FlowedRouteBuilder {
    pub fn add_link(&mut self, stats: FlowedLinkStats, weight: f64) -> Result<&mut Self, RouteError> {
        if stats.flow() != &self.connection.flow {
            return Err(RouteError::FlowMismatch {
                expected: self.connection.flow.clone(),
                actual: stats.flow().clone(),
            });
        }
        let link = stats.datapath_link();
        if !weight.is_finite() || weight < 0.0 {
            return Err(RouteError::InvalidWeight { link, weight });
        }
        if let Some(prev) = self.links.last() {
            if !link.succeeds(prev) {
                return Err(RouteError::DisconnectedLink { prev: *prev, link });
            }
        }
        self.links.push(link);
        self.link_stats.push(stats);
        self.weight += weight;
        Ok(self)
    }

    pub fn build(self) -> Result<FlowedRoute, RouteError> {
        let path = DatapathPath::from_links(&self.connection.connection, &self.links)?.flowed(self.connection.flow.clone());

        let mut latency = Stat::safe(Some(0.0), 0);
        let mut byte_loss = Stat::safe(Some(0.0), 0);
        let mut throughput: Stat<Option<InfoRate>> = Stat::safe(if self.link_stats.is_empty() { Some(InfoRate::ZERO) } else { None }, 0);
        let mut data_capacity: Stat<Option<InfoRate>> = Stat::new(None, 0, StatType::Safe);
        for stats in self.link_stats.iter() {
            latency = latency.combine(&stats.mean_latency(), |total, hop| match (total, hop) {
                (Some(total), Some(hop)) => Some(total + hop),
                _ => None,
            });
            byte_loss = byte_loss.combine(&stats.mean_byte_loss(), |total, hop| match (total, hop) {
                (Some(total), Some(hop)) => Some(total + hop - total * hop),
                _ => None,
            });
            throughput = throughput.combine(stats.throughput(), |total, hop| match (total, hop) {
                (Some(total), Some(hop)) => Some(total.max(*hop)),
                (total, hop) => total.or(*hop),
            });
            data_capacity = data_capacity.combine(stats.data_capacity(), |total, hop| match (total, hop) {
                (Some(total), Some(hop)) => Some(total.min(*hop)),
                (total, hop) => total.or(*hop),
            });
        }

        Ok(FlowedRoute {
            path,
            link_stats: self.link_stats,
            weight: self.weight,
            latency,
            byte_loss,
            throughput,
            data_capacity,
        })
    }
}
