use std::collections::BTreeMap;
use std::sync::Arc;

use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection};
use te_sdn_stats::{FlowedLinkStats, InfoRate, LinkWeigher, Stat};
use te_sdn_topology::DatapathTopology;

use crate::search::{self, LinkWeights, WeightedPath};
use crate::{FlowedRoute, RouteError};

type StatsMap = BTreeMap<DatapathLink, FlowedLinkStats>;

/// Topology as seen by one flow: the shared graph plus the latest statistics of each link.
///
/// Links never measured report absent statistics. Virtual capacities override the measured
/// capacity of a link until they are cleared.
pub struct FlowedTopology {
    flow: Flow,
    graph: Arc<DatapathTopology>,
    measured: StatsMap,
    virtual_capacities: BTreeMap<DatapathLink, Stat<Option<InfoRate>>>,
    effective: Arc<StatsMap>,
}

impl FlowedTopology {
    pub fn new(flow: Flow, graph: Arc<DatapathTopology>) -> Self {
        Self {
            flow,
            graph,
            measured: StatsMap::new(),
            virtual_capacities: BTreeMap::new(),
            effective: Arc::new(StatsMap::new()),
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn graph(&self) -> &Arc<DatapathTopology> {
        &self.graph
    }

    /// Replaces the connectivity, stored statistics are kept
    pub fn update_topology(&mut self, graph: Arc<DatapathTopology>) {
        log::trace!("[FlowedTopology {}] topology updated to {} nodes, {} links", self.flow, graph.node_count(), graph.link_count());
        self.graph = graph;
    }

    pub fn update_link_statistics(&mut self, stats: FlowedLinkStats) -> Result<(), RouteError> {
        if stats.flow() != &self.flow {
            return Err(RouteError::FlowMismatch {
                expected: self.flow.clone(),
                actual: stats.flow().clone(),
            });
        }
        let link = stats.datapath_link();
        log::trace!("[FlowedTopology {}] stats updated for {}", self.flow, link);
        self.measured.insert(link, stats);
        self.refresh(link);
        Ok(())
    }

    /// Reverts the link to absent statistics, returns the cleared ones
    pub fn clear_link_statistics(&mut self, link: &DatapathLink) -> Option<FlowedLinkStats> {
        let cleared = self.measured.remove(link)?;
        log::trace!("[FlowedTopology {}] stats cleared for {}", self.flow, link);
        self.refresh(*link);
        Some(cleared)
    }

    /// Sets or clears (None) a capacity override for the link, returns true if the effective statistics changed
    pub fn set_virtual_capacity(&mut self, link: DatapathLink, capacity: Option<Stat<Option<InfoRate>>>) -> bool {
        let before = self.link_statistics(&link);
        match capacity {
            Some(capacity) => {
                self.virtual_capacities.insert(link, capacity);
            }
            None => {
                self.virtual_capacities.remove(&link);
            }
        }
        self.refresh(link);
        before != self.link_statistics(&link)
    }

    /// Capacity measured on the link, ignoring virtual overrides
    pub fn physical_capacity(&self, link: &DatapathLink) -> Option<InfoRate> {
        self.measured.get(link).and_then(|s| *s.data_capacity().value())
    }

    /// Effective statistics of a link, absent if never measured
    pub fn link_statistics(&self, link: &DatapathLink) -> FlowedLinkStats {
        lookup(&self.effective, &self.flow, link)
    }

    pub fn contains_link(&self, link: &DatapathLink) -> bool {
        self.graph.contains_link(link)
    }

    /// Routing handle for the connection, empty when one of its endpoints is not in the topology
    pub fn connection_map(&self, connection: DatapathConnection) -> ConnectionMap {
        let present = self.graph.contains_node(connection.entry_node()) && self.graph.contains_node(connection.exit_node());
        ConnectionMap {
            connection: connection.flowed(self.flow.clone()),
            graph: if present { Some(self.graph.clone()) } else { None },
            stats: self.effective.clone(),
        }
    }

    fn refresh(&mut self, link: DatapathLink) {
        let stats = self.measured.get(&link).cloned();
        let effective = match (stats, self.virtual_capacities.get(&link)) {
            (stats, Some(capacity)) => Some(stats.unwrap_or_else(|| FlowedLinkStats::absent(link.flowed(self.flow.clone()))).with_data_capacity(*capacity)),
            (stats, None) => stats,
        };
        let map = Arc::make_mut(&mut self.effective);
        match effective {
            Some(stats) => map.insert(link, stats),
            None => map.remove(&link),
        };
    }
}

fn lookup(stats: &StatsMap, flow: &Flow, link: &DatapathLink) -> FlowedLinkStats {
    stats.get(link).cloned().unwrap_or_else(|| FlowedLinkStats::absent(link.flowed(flow.clone())))
}

/// Route queries for one flowed connection over a fixed view of the flowed topology.
///
/// An empty map (an endpoint missing from the topology) answers every query with no routes.
#[derive(Clone)]
pub struct ConnectionMap {
    connection: FlowedConnection,
    graph: Option<Arc<DatapathTopology>>,
    stats: Arc<StatsMap>,
}

impl ConnectionMap {
    pub fn connection(&self) -> &FlowedConnection {
        &self.connection
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_none()
    }

    pub fn link_statistics(&self, link: &DatapathLink) -> FlowedLinkStats {
        lookup(&self.stats, &self.connection.flow, link)
    }

    /// Cheapest route, None when the exit is unreachable
    pub fn best_route<W: LinkWeigher + ?Sized>(&self, weigher: &W) -> Result<Option<FlowedRoute>, RouteError> {
        let (graph, weights) = match self.weighted(weigher)? {
            Some(weighted) => weighted,
            None => return Ok(None),
        };
        match search::shortest_path(&graph, &weights, self.connection.entry_node(), self.connection.exit_node(), &Default::default(), &Default::default()) {
            Some(path) => Ok(Some(self.build_route(&path, &weights)?)),
            None => Ok(None),
        }
    }

    /// Up to `max_routes` loopless routes in non-decreasing weight order, empty when `max_routes` is 0
    pub fn best_routes<W: LinkWeigher + ?Sized>(&self, max_routes: usize, weigher: &W) -> Result<Vec<FlowedRoute>, RouteError> {
        if max_routes < 1 {
            return Ok(vec![]);
        }
        let (graph, weights) = match self.weighted(weigher)? {
            Some(weighted) => weighted,
            None => return Ok(vec![]),
        };
        search::k_shortest_paths(&graph, &weights, self.connection.entry_node(), self.connection.exit_node(), max_routes)
            .iter()
            .map(|path| self.build_route(path, &weights))
            .collect()
    }

    /// Every simple route, sorted by weight.
    ///
    /// Exponential in the size of the topology, only meant for debugging small networks.
    pub fn all_routes<W: LinkWeigher + ?Sized>(&self, weigher: &W) -> Result<Vec<FlowedRoute>, RouteError> {
        self.all_routes_limited(usize::MAX, weigher)
    }

    /// Like `all_routes` but stops enumerating after `limit` routes
    pub fn all_routes_limited<W: LinkWeigher + ?Sized>(&self, limit: usize, weigher: &W) -> Result<Vec<FlowedRoute>, RouteError> {
        let (graph, weights) = match self.weighted(weigher)? {
            Some(weighted) => weighted,
            None => return Ok(vec![]),
        };
        let mut routes = search::all_simple_paths(&graph, &weights, self.connection.entry_node(), self.connection.exit_node(), limit)
            .iter()
            .map(|path| self.build_route(path, &weights))
            .collect::<Result<Vec<_>, _>>()?;
        routes.sort_by(|a, b| a.weight().total_cmp(&b.weight()));
        Ok(routes)
    }

    fn weighted<W: LinkWeigher + ?Sized>(&self, weigher: &W) -> Result<Option<(Arc<DatapathTopology>, LinkWeights)>, RouteError> {
        let graph = match &self.graph {
            Some(graph) => graph.clone(),
            None => return Ok(None),
        };
        let mut weights = LinkWeights::with_capacity(graph.link_count());
        for link in graph.links() {
            let weight = weigher.link_weight(&self.link_statistics(link));
            if !weight.is_finite() || weight < 0.0 {
                return Err(RouteError::InvalidWeight { link: *link, weight });
            }
            weights.insert(*link, weight);
        }
        Ok(Some((graph, weights)))
    }

    fn build_route(&self, path: &WeightedPath, weights: &LinkWeights) -> Result<FlowedRoute, RouteError> {
        let mut builder = FlowedRoute::builder(self.connection.clone());
        for link in path.links.iter() {
            builder.add_link(self.link_statistics(link), weights.get(link).copied().unwrap_or(0.0))?;
        }
        builder.build()
    }
}
