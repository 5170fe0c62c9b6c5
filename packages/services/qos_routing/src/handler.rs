use std::collections::BTreeMap;
use std::sync::Arc;

use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection};
use te_sdn_router::{ConnectionMap, FlowedRoute, FlowedTopology, RouteError};
use te_sdn_stats::{FlowedLinkStats, InfoRate, LinkWeigher, Stat};
use te_sdn_topology::DatapathTopology;

use crate::diff::RouteDiff;

/// Bookkeeping of one flow: its topology view and the active route of each registered connection
pub(crate) struct FlowHandler {
    topology: FlowedTopology,
    routes: BTreeMap<DatapathConnection, Option<FlowedRoute>>,
}

impl FlowHandler {
    pub fn new(flow: Flow, graph: Arc<DatapathTopology>, virtual_capacities: &BTreeMap<DatapathLink, Stat<Option<InfoRate>>>) -> Self {
        let mut topology = FlowedTopology::new(flow, graph);
        for (link, capacity) in virtual_capacities {
            topology.set_virtual_capacity(*link, Some(*capacity));
        }
        Self { topology, routes: BTreeMap::new() }
    }

    pub fn flow(&self) -> &Flow {
        self.topology.flow()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, connection: &DatapathConnection) -> bool {
        self.routes.contains_key(connection)
    }

    /// Returns false if the connection was already registered
    pub fn register(&mut self, connection: DatapathConnection) -> bool {
        if self.routes.contains_key(&connection) {
            return false;
        }
        self.routes.insert(connection, None);
        true
    }

    /// Returns the last active route, or None if the connection was not registered
    pub fn unregister(&mut self, connection: &DatapathConnection) -> Option<Option<FlowedRoute>> {
        self.routes.remove(connection)
    }

    pub fn connections(&self) -> impl Iterator<Item = FlowedConnection> + '_ {
        self.routes.keys().map(|c| c.flowed(self.flow().clone()))
    }

    pub fn active_route(&self, connection: &DatapathConnection) -> Option<&FlowedRoute> {
        self.routes.get(connection).and_then(|r| r.as_ref())
    }

    pub fn active_routes(&self) -> impl Iterator<Item = &FlowedRoute> + '_ {
        self.routes.values().filter_map(|r| r.as_ref())
    }

    pub fn connection_map(&self, connection: DatapathConnection) -> ConnectionMap {
        self.topology.connection_map(connection)
    }

    pub fn connection_maps(&self) -> impl Iterator<Item = ConnectionMap> + '_ {
        self.routes.keys().map(|c| self.topology.connection_map(*c))
    }

    pub fn physical_capacity(&self, link: &DatapathLink) -> Option<InfoRate> {
        self.topology.physical_capacity(link)
    }

    pub fn update_topology(&mut self, graph: Arc<DatapathTopology>) {
        self.topology.update_topology(graph);
    }

    pub fn update_link_statistics(&mut self, stats: FlowedLinkStats) -> Result<(), RouteError> {
        self.topology.update_link_statistics(stats)
    }

    pub fn clear_link_statistics(&mut self, link: &DatapathLink) -> bool {
        self.topology.clear_link_statistics(link).is_some()
    }

    pub fn set_virtual_capacity(&mut self, link: DatapathLink, capacity: Option<Stat<Option<InfoRate>>>) -> bool {
        self.topology.set_virtual_capacity(link, capacity)
    }

    /// Recomputes the best route of one connection and stores it according to the diff
    pub fn recompute<W: LinkWeigher + ?Sized>(&mut self, connection: DatapathConnection, weigher: &W) -> RouteDiff {
        let new = match self.topology.connection_map(connection).best_route(weigher) {
            Ok(route) => route,
            Err(err) => {
                log::error!("[QosRouting] cannot compute route for {} {}: {}", connection, self.flow(), err);
                None
            }
        };
        let slot = match self.routes.get_mut(&connection) {
            Some(slot) => slot,
            None => return RouteDiff::Unchanged,
        };
        let diff = RouteDiff::between(slot.as_ref(), new.as_ref());
        if let Some(next) = diff.next_active() {
            *slot = next.cloned();
        }
        diff
    }

    /// Recomputes every registered connection in connection order
    pub fn recompute_all<W: LinkWeigher + ?Sized>(&mut self, weigher: &W) -> Vec<(DatapathConnection, RouteDiff)> {
        let connections: Vec<DatapathConnection> = self.routes.keys().copied().collect();
        connections.into_iter().map(|c| (c, self.recompute(c, weigher))).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, NodeId, PortId};
    use te_sdn_stats::{InfoRate, RouteWeigher, Stat};
    use te_sdn_topology::DatapathTopology;

    use super::FlowHandler;
    use crate::diff::RouteDiff;

    fn line() -> Arc<DatapathTopology> {
        let mut topo = DatapathTopology::new();
        topo.add_node(NodeId::new(1));
        topo.add_node(NodeId::new(2));
        topo.add_link(DatapathLink::of(NodeId::new(1), PortId::new(1), NodeId::new(2), PortId::new(1))).expect("should add");
        Arc::new(topo)
    }

    fn conn() -> DatapathConnection {
        DatapathConnection::of(NodeId::new(1), PortId::new(100), NodeId::new(2), PortId::new(200))
    }

    #[test]
    fn recompute_tracks_active_route() {
        let mut handler = FlowHandler::new(Flow::all(), Arc::new(DatapathTopology::new()), &BTreeMap::new());
        assert!(handler.register(conn()));
        assert!(!handler.register(conn()));
        assert_eq!(handler.recompute(conn(), &RouteWeigher::Goodness), RouteDiff::Unchanged);

        handler.update_topology(line());
        assert!(matches!(handler.recompute(conn(), &RouteWeigher::Goodness), RouteDiff::Install(_)));
        assert!(handler.active_route(&conn()).is_some());
        assert_eq!(handler.recompute(conn(), &RouteWeigher::Goodness), RouteDiff::Unchanged);

        handler.update_topology(Arc::new(DatapathTopology::new()));
        assert!(matches!(handler.recompute(conn(), &RouteWeigher::Goodness), RouteDiff::Remove(_)));
        assert!(handler.active_route(&conn()).is_none());
        assert_eq!(handler.unregister(&conn()), Some(None));
        assert!(handler.is_empty());
    }

    #[test]
    fn new_handler_inherits_virtual_capacities() {
        let link = DatapathLink::of(NodeId::new(1), PortId::new(1), NodeId::new(2), PortId::new(1));
        let capacities = BTreeMap::from([(link, Stat::safe(Some(InfoRate::from_mbps(5.0)), 1))]);
        let mut handler = FlowHandler::new(Flow::all(), line(), &capacities);
        handler.register(conn());
        handler.recompute(conn(), &RouteWeigher::Goodness);
        let route = handler.active_route(&conn()).expect("should route");
        assert_eq!(*route.data_capacity().value(), Some(InfoRate::from_mbps(5.0)));
        assert_eq!(handler.physical_capacity(&link), None);
    }
}
