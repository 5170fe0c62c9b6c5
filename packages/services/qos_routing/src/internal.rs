use std::collections::{btree_map::Entry, BTreeMap, VecDeque};
use std::sync::Arc;

use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection, FlowedLink};
use te_sdn_router::{ConnectionMap, FlowedRoute};
use te_sdn_stats::{FlowedLinkStats, InfoRate, Stat};
use te_sdn_topology::{DatapathTopology, TopologySnapshot};

use crate::diff::RouteDiff;
use crate::handler::FlowHandler;
use crate::{RoutingConfig, RoutingError, RoutingEvent};

/// Routing state machine without any locking, outputs are queued as events
pub(crate) struct RoutingInternal {
    config: RoutingConfig,
    graph: Arc<DatapathTopology>,
    topology_version: Option<u64>,
    handlers: BTreeMap<Flow, FlowHandler>,
    virtual_capacities: BTreeMap<DatapathLink, Stat<Option<InfoRate>>>,
    events: VecDeque<RoutingEvent>,
}

impl RoutingInternal {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            graph: Arc::new(DatapathTopology::new()),
            topology_version: None,
            handlers: BTreeMap::new(),
            virtual_capacities: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn register(&mut self, connection: FlowedConnection) -> Result<(), RoutingError> {
        let handler = match self.handlers.entry(connection.flow.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::info!("[QosRouting] tracking new flow {}", entry.key());
                entry.insert(FlowHandler::new(connection.flow.clone(), self.graph.clone(), &self.virtual_capacities))
            }
        };
        if !handler.register(connection.connection) {
            return Err(RoutingError::AlreadyRegistered(connection));
        }
        log::info!("[QosRouting] registered connection {}", connection);
        self.events.push_back(RoutingEvent::ConnectionRegistered(connection.clone()));
        let diff = handler.recompute(connection.connection, &self.config.strategy);
        Self::push_diff(&self.config, &mut self.events, connection, diff);
        Ok(())
    }

    pub fn unregister(&mut self, connection: &FlowedConnection) -> Result<Option<FlowedRoute>, RoutingError> {
        let handler = self.handlers.get_mut(&connection.flow).ok_or_else(|| RoutingError::NotRegistered(connection.clone()))?;
        let last_route = handler.unregister(&connection.connection).ok_or_else(|| RoutingError::NotRegistered(connection.clone()))?;
        if handler.is_empty() {
            log::info!("[QosRouting] no more connections for flow {}, dropping its bookkeeping", connection.flow);
            self.handlers.remove(&connection.flow);
        }
        log::info!("[QosRouting] unregistered connection {}", connection);
        self.events.push_back(RoutingEvent::ConnectionUnregistered {
            connection: connection.clone(),
            last_route: last_route.clone(),
        });
        Ok(last_route)
    }

    /// Applies a topology snapshot newer than the last applied one, returns false if it was skipped
    pub fn update_topology(&mut self, snapshot: &TopologySnapshot) -> bool {
        match self.topology_version {
            Some(version) if version > snapshot.version() => {
                log::debug!("[QosRouting] ignoring stale topology version {}", snapshot.version());
                return false;
            }
            Some(version) if version == snapshot.version() => {
                log::trace!("[QosRouting] topology version {} already applied", version);
                return false;
            }
            _ => {}
        }
        self.topology_version = Some(snapshot.version());
        self.replace_graph(snapshot.graph().clone());
        true
    }

    fn replace_graph(&mut self, graph: Arc<DatapathTopology>) {
        log::debug!("[QosRouting] topology changed, recomputing {} flows", self.handlers.len());
        self.graph = graph;
        for handler in self.handlers.values_mut() {
            handler.update_topology(self.graph.clone());
            Self::recompute_handler(&self.config, &mut self.events, handler);
        }
    }

    pub fn graph(&self) -> &Arc<DatapathTopology> {
        &self.graph
    }

    /// Statistics of flows without registered connections are ignored
    pub fn update_link_statistics(&mut self, stats: FlowedLinkStats) -> Result<(), RoutingError> {
        let handler = match self.handlers.get_mut(stats.flow()) {
            Some(handler) => handler,
            None => {
                log::trace!("[QosRouting] ignoring stats of untracked flow for {}", stats.link());
                return Ok(());
            }
        };
        handler.update_link_statistics(stats)?;
        Self::recompute_handler(&self.config, &mut self.events, handler);
        Ok(())
    }

    pub fn clear_link_statistics(&mut self, link: &FlowedLink) {
        if let Some(handler) = self.handlers.get_mut(link.flow()) {
            if handler.clear_link_statistics(&link.unflowed()) {
                Self::recompute_handler(&self.config, &mut self.events, handler);
            }
        }
    }

    /// Sets or clears a capacity override on a link for every flow, returns true if the override changed.
    ///
    /// The capacity must not be zero and must not exceed the measured capacity of the link in any flow.
    pub fn update_virtual_capacity(&mut self, link: DatapathLink, capacity: Option<InfoRate>, now_ms: u64) -> Result<bool, RoutingError> {
        if let Some(capacity) = capacity {
            if capacity.is_zero() || !capacity.bps().is_finite() || capacity.bps() < 0.0 {
                return Err(RoutingError::InvalidCapacity {
                    link,
                    reason: format!("{} is not a positive capacity", capacity),
                });
            }
            let physical = self.handlers.values().filter_map(|h| h.physical_capacity(&link)).reduce(InfoRate::min);
            if let Some(physical) = physical {
                if capacity > physical {
                    return Err(RoutingError::InvalidCapacity {
                        link,
                        reason: format!("{} exceeds the physical capacity {}", capacity, physical),
                    });
                }
            }
        }

        let stat = capacity.map(|c| Stat::safe(Some(c), now_ms));
        let changed = match stat {
            Some(stat) => self.virtual_capacities.insert(link, stat) != Some(stat),
            None => self.virtual_capacities.remove(&link).is_some(),
        };
        if changed {
            log::info!("[QosRouting] virtual capacity of {} set to {:?}", link, capacity);
        }
        for handler in self.handlers.values_mut() {
            if handler.set_virtual_capacity(link, stat) {
                Self::recompute_handler(&self.config, &mut self.events, handler);
            }
        }
        Ok(changed)
    }

    pub fn pop_event(&mut self) -> Option<RoutingEvent> {
        self.events.pop_front()
    }

    pub fn registered_connections(&self) -> Vec<FlowedConnection> {
        self.handlers.values().flat_map(|h| h.connections()).collect()
    }

    pub fn is_registered(&self, connection: &FlowedConnection) -> bool {
        self.handlers.get(&connection.flow).map(|h| h.contains(&connection.connection)).unwrap_or(false)
    }

    pub fn active_route(&self, connection: &FlowedConnection) -> Option<FlowedRoute> {
        self.handlers.get(&connection.flow)?.active_route(&connection.connection).cloned()
    }

    pub fn all_active_routes(&self) -> Vec<FlowedRoute> {
        self.handlers.values().flat_map(|h| h.active_routes().cloned()).collect()
    }

    pub fn all_active_routes_for(&self, flow: &Flow) -> Vec<FlowedRoute> {
        self.handlers.get(flow).map(|h| h.active_routes().cloned().collect()).unwrap_or_default()
    }

    pub fn connection_map(&self, connection: &FlowedConnection) -> Option<ConnectionMap> {
        let handler = self.handlers.get(&connection.flow)?;
        if handler.contains(&connection.connection) {
            Some(handler.connection_map(connection.connection))
        } else {
            None
        }
    }

    pub fn all_connection_maps(&self) -> Vec<ConnectionMap> {
        self.handlers.values().flat_map(|h| h.connection_maps()).collect()
    }

    pub fn all_connection_maps_for(&self, flow: &Flow) -> Vec<ConnectionMap> {
        self.handlers.get(flow).map(|h| h.connection_maps().collect()).unwrap_or_default()
    }

    fn recompute_handler(config: &RoutingConfig, events: &mut VecDeque<RoutingEvent>, handler: &mut FlowHandler) {
        let flow = handler.flow().clone();
        for (connection, diff) in handler.recompute_all(&config.strategy) {
            Self::push_diff(config, events, connection.flowed(flow.clone()), diff);
        }
    }

    fn push_diff(config: &RoutingConfig, events: &mut VecDeque<RoutingEvent>, connection: FlowedConnection, diff: RouteDiff) {
        let printable = config.is_printable(&connection);
        match diff {
            RouteDiff::Install(new) => {
                if printable {
                    log::info!("[QosRouting] installing new route:\n{}", new.to_pretty_string());
                } else {
                    log::info!("[QosRouting] installing route {}", new);
                }
                events.push_back(RoutingEvent::RouteInstalled(new));
            }
            RouteDiff::Replace { old, new } => {
                if printable {
                    log::info!("[QosRouting] replacing route {:x} with:\n{}", old.path_id(), new.to_pretty_string());
                } else {
                    log::info!("[QosRouting] replacing route {} with {}", old, new);
                }
                events.push_back(RoutingEvent::RouteReplacing { old, new });
            }
            RouteDiff::StatsUpdate(new) => {
                log::debug!("[QosRouting] route stats updated {}", new);
                events.push_back(RoutingEvent::RouteStatsUpdated(new));
            }
            RouteDiff::Remove(old) => {
                log::info!("[QosRouting] removing route of {}", connection);
                events.push_back(RoutingEvent::RouteRemoved { connection, old });
            }
            RouteDiff::Unchanged => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection, MatchEntry, MatchField, NodeId, PortId};
    use te_sdn_stats::{FlowedLinkStats, InfoRate, Stat};
    use te_sdn_topology::{DatapathTopology, TopologySnapshot};

    use super::RoutingInternal;
    use crate::{RoutingConfig, RoutingError, RoutingEvent};

    fn link() -> DatapathLink {
        DatapathLink::of(NodeId::new(1), PortId::new(1), NodeId::new(2), PortId::new(1))
    }

    fn line() -> TopologySnapshot {
        let mut topo = DatapathTopology::new();
        topo.add_node(NodeId::new(1));
        topo.add_node(NodeId::new(2));
        topo.add_link(link()).expect("should add");
        TopologySnapshot::new(3, topo, Default::default())
    }

    fn conn(flow: Flow) -> FlowedConnection {
        DatapathConnection::of(NodeId::new(1), PortId::new(100), NodeId::new(2), PortId::new(200)).flowed(flow)
    }

    fn drain(internal: &mut RoutingInternal) -> Vec<RoutingEvent> {
        std::iter::from_fn(|| internal.pop_event()).collect()
    }

    #[test]
    fn register_twice_is_rejected_without_side_effects() {
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        internal.update_topology(&line());
        internal.register(conn(Flow::all())).expect("should register");
        assert_eq!(drain(&mut internal).len(), 2);
        assert_eq!(internal.register(conn(Flow::all())), Err(RoutingError::AlreadyRegistered(conn(Flow::all()))));
        assert!(drain(&mut internal).is_empty());
        assert_eq!(internal.registered_connections(), vec![conn(Flow::all())]);
    }

    #[test]
    fn unregister_last_connection_drops_flow() {
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        internal.update_topology(&line());
        internal.register(conn(Flow::all())).expect("should register");
        drain(&mut internal);

        let last = internal.unregister(&conn(Flow::all())).expect("should unregister");
        assert!(last.is_some());
        assert!(internal.all_connection_maps().is_empty());
        assert_eq!(internal.unregister(&conn(Flow::all())), Err(RoutingError::NotRegistered(conn(Flow::all()))));
        assert!(matches!(drain(&mut internal).as_slice(), [RoutingEvent::ConnectionUnregistered { last_route: Some(_), .. }]));
    }

    #[test]
    fn stats_only_touch_their_flow() {
        let web = Flow::all().with(MatchEntry::exact(MatchField::TcpDst, 80));
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        internal.update_topology(&line());
        internal.register(conn(Flow::all())).expect("should register");
        internal.register(conn(web.clone())).expect("should register");
        drain(&mut internal);

        let stats = FlowedLinkStats::absent(link().flowed(web.clone())).with_data_capacity(Stat::safe(Some(InfoRate::from_mbps(10.0)), 5));
        internal.update_link_statistics(stats).expect("should update");
        let events = drain(&mut internal);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RoutingEvent::RouteStatsUpdated(route) if route.flow() == &web));

        let untracked = Flow::all().with(MatchEntry::exact(MatchField::TcpDst, 443));
        internal.update_link_statistics(FlowedLinkStats::absent(link().flowed(untracked))).expect("should ignore");
        assert!(drain(&mut internal).is_empty());

        internal.clear_link_statistics(&link().flowed(web.clone()));
        assert!(matches!(drain(&mut internal).as_slice(), [RoutingEvent::RouteStatsUpdated(_)]));
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        assert!(internal.update_topology(&line()));
        internal.register(conn(Flow::all())).expect("should register");
        drain(&mut internal);

        assert!(!internal.update_topology(&TopologySnapshot::new(1, DatapathTopology::new(), Default::default())));
        assert!(drain(&mut internal).is_empty());
        assert_eq!(internal.graph().link_count(), 1);

        assert!(internal.update_topology(&TopologySnapshot::new(4, DatapathTopology::new(), Default::default())));
        assert!(matches!(drain(&mut internal).as_slice(), [RoutingEvent::RouteRemoved { .. }]));
    }

    #[test]
    fn same_version_is_applied_once() {
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        assert!(internal.update_topology(&line()));
        internal.register(conn(Flow::all())).expect("should register");
        drain(&mut internal);

        // removing a node delivers the same snapshot once per event
        assert!(!internal.update_topology(&line()));
        assert!(!internal.update_topology(&TopologySnapshot::new(3, DatapathTopology::new(), Default::default())));
        assert!(drain(&mut internal).is_empty());
        assert_eq!(internal.graph().link_count(), 1);
    }

    #[test]
    fn virtual_capacity_rules() {
        let mut internal = RoutingInternal::new(RoutingConfig::default());
        internal.update_topology(&line());
        internal.register(conn(Flow::all())).expect("should register");
        let measured = FlowedLinkStats::absent(link().flowed(Flow::all())).with_data_capacity(Stat::safe(Some(InfoRate::from_mbps(100.0)), 5));
        internal.update_link_statistics(measured).expect("should update");
        drain(&mut internal);

        assert!(matches!(internal.update_virtual_capacity(link(), Some(InfoRate::ZERO), 10), Err(RoutingError::InvalidCapacity { .. })));
        assert!(matches!(internal.update_virtual_capacity(link(), Some(InfoRate::from_mbps(200.0)), 10), Err(RoutingError::InvalidCapacity { .. })));
        assert!(drain(&mut internal).is_empty());

        assert_eq!(internal.update_virtual_capacity(link(), Some(InfoRate::from_mbps(40.0)), 10), Ok(true));
        let route = internal.active_route(&conn(Flow::all())).expect("should route");
        assert_eq!(*route.data_capacity().value(), Some(InfoRate::from_mbps(40.0)));
        assert!(matches!(drain(&mut internal).as_slice(), [RoutingEvent::RouteStatsUpdated(_)]));

        assert_eq!(internal.update_virtual_capacity(link(), None, 11), Ok(true));
        assert_eq!(internal.update_virtual_capacity(link(), None, 12), Ok(false));
        let route = internal.active_route(&conn(Flow::all())).expect("should route");
        assert_eq!(*route.data_capacity().value(), Some(InfoRate::from_mbps(100.0)));
    }
}
