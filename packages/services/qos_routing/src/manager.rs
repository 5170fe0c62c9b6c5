use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use te_sdn_identity::{DatapathLink, Flow, FlowedConnection, FlowedLink};
use te_sdn_router::{ConnectionMap, FlowedRoute};
use te_sdn_stats::{FlowedLinkStats, InfoRate};
use te_sdn_topology::{TopologyEvent, TopologyGraph, TopologyListener, TopologySnapshot};
use te_sdn_utils::{SystemTimer, Timer};

use crate::internal::RoutingInternal;
use crate::{QosRoutingListener, RoutingConfig, RoutingError, RoutingEvent};

/// Shared handle over the routing state machine.
///
/// Every command runs under one lock; the events it produced are then delivered to listeners in
/// registration order with the state lock released, so a listener may query the manager but must
/// not send commands to it. Route queries run on immutable connection maps outside the lock.
#[derive(Clone)]
pub struct QosRoutingManager {
    internal: Arc<Mutex<RoutingInternal>>,
    listeners: Arc<Mutex<Vec<Arc<dyn QosRoutingListener>>>>,
    timer: Arc<dyn Timer>,
}

impl QosRoutingManager {
    pub fn new(config: RoutingConfig) -> Self {
        Self::with_timer(config, Arc::new(SystemTimer()))
    }

    pub fn with_timer(config: RoutingConfig, timer: Arc<dyn Timer>) -> Self {
        log::info!("[QosRouting] created with strategy {}", config.strategy);
        Self {
            internal: Arc::new(Mutex::new(RoutingInternal::new(config))),
            listeners: Arc::new(Mutex::new(vec![])),
            timer,
        }
    }

    /// Subscribes to the topology store and starts from its current state
    pub fn attach(&self, topology: &TopologyGraph) {
        let snapshot = topology.subscribe(Arc::new(self.clone()));
        log::info!("[QosRouting] attached to topology version {}", snapshot.version());
        self.update_topology(&snapshot);
    }

    pub fn add_listener(&self, listener: Arc<dyn QosRoutingListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn config(&self) -> RoutingConfig {
        self.internal.lock().config().clone()
    }

    /// Registers the connection and computes its first route
    pub fn register_connection(&self, connection: FlowedConnection) -> Result<(), RoutingError> {
        self.execute(|internal| internal.register(connection))
    }

    /// Unregisters the connection, returning its last active route
    pub fn unregister_connection(&self, connection: &FlowedConnection) -> Result<Option<FlowedRoute>, RoutingError> {
        self.execute(|internal| internal.unregister(connection))
    }

    /// Applies a topology snapshot, recomputing every registered connection
    pub fn update_topology(&self, snapshot: &TopologySnapshot) {
        self.execute(|internal| {
            internal.update_topology(snapshot);
        })
    }

    /// New measurement for a link of one flow, recomputes the connections of that flow
    pub fn on_link_stats_updated(&self, stats: FlowedLinkStats) -> Result<(), RoutingError> {
        self.execute(|internal| internal.update_link_statistics(stats))
    }

    /// Measurements of a link stopped, the link reverts to absent statistics in its flow
    pub fn on_link_stats_cleared(&self, link: &FlowedLink) {
        self.execute(|internal| internal.clear_link_statistics(link))
    }

    /// Overrides (or clears with None) the capacity of a link in every flow
    pub fn update_virtual_capacity(&self, link: DatapathLink, capacity: Option<InfoRate>) -> Result<bool, RoutingError> {
        let now_ms = self.timer.now_ms();
        self.execute(|internal| internal.update_virtual_capacity(link, capacity, now_ms))
    }

    pub fn registered_connections(&self) -> Vec<FlowedConnection> {
        self.internal.lock().registered_connections()
    }

    pub fn is_registered(&self, connection: &FlowedConnection) -> bool {
        self.internal.lock().is_registered(connection)
    }

    pub fn active_route(&self, connection: &FlowedConnection) -> Option<FlowedRoute> {
        self.internal.lock().active_route(connection)
    }

    pub fn all_active_routes(&self) -> Vec<FlowedRoute> {
        self.internal.lock().all_active_routes()
    }

    pub fn all_active_routes_for(&self, flow: &Flow) -> Vec<FlowedRoute> {
        self.internal.lock().all_active_routes_for(flow)
    }

    pub fn connection_map(&self, connection: &FlowedConnection) -> Option<ConnectionMap> {
        self.internal.lock().connection_map(connection)
    }

    pub fn all_connection_maps(&self) -> Vec<ConnectionMap> {
        self.internal.lock().all_connection_maps()
    }

    pub fn all_connection_maps_for(&self, flow: &Flow) -> Vec<ConnectionMap> {
        self.internal.lock().all_connection_maps_for(flow)
    }

    /// Up to `max_alternate_routes` best routes of a registered connection, best first
    pub fn alternate_routes(&self, connection: &FlowedConnection) -> Result<Vec<FlowedRoute>, RoutingError> {
        let (map, config) = self.query_map(connection)?;
        Ok(map.best_routes(config.max_alternate_routes, &config.strategy)?)
    }

    /// Every simple route of a registered connection sorted by weight, capped by `all_routes_limit`
    pub fn all_routes(&self, connection: &FlowedConnection) -> Result<Vec<FlowedRoute>, RoutingError> {
        let (map, config) = self.query_map(connection)?;
        Ok(map.all_routes_limited(config.all_routes_limit, &config.strategy)?)
    }

    fn query_map(&self, connection: &FlowedConnection) -> Result<(ConnectionMap, RoutingConfig), RoutingError> {
        let internal = self.internal.lock();
        let map = internal.connection_map(connection).ok_or_else(|| RoutingError::NotRegistered(connection.clone()))?;
        Ok((map, internal.config().clone()))
    }

    /// Runs one command under the state lock, then delivers the queued events.
    ///
    /// The listener lock is taken first and held during delivery so events of consecutive commands never interleave.
    fn execute<R, F>(&self, command: F) -> R
    where
        F: FnOnce(&mut RoutingInternal) -> R,
    {
        let listeners = self.listeners.lock();
        let (res, events) = {
            let mut internal = self.internal.lock();
            let res = command(&mut *internal);
            let events: Vec<RoutingEvent> = std::iter::from_fn(|| internal.pop_event()).collect();
            (res, events)
        };

        for event in events.iter() {
            for listener in listeners.iter() {
                if catch_unwind(AssertUnwindSafe(|| listener.on_routing_event(event))).is_err() {
                    log::error!("[QosRouting] listener panicked while handling event of {}", event.connection());
                }
            }
        }
        res
    }
}

impl TopologyListener for QosRoutingManager {
    fn on_topology_event(&self, event: &TopologyEvent, snapshot: &TopologySnapshot) {
        if event.changes_connectivity() {
            self.update_topology(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::{predicate, Sequence};
    use parking_lot::Mutex;
    use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection, NodeId, PortId};
    use te_sdn_stats::{FlowedLinkStats, InfoRate, Stat, Summary};
    use te_sdn_topology::TopologyGraph;
    use te_sdn_utils::Timer;

    use super::QosRoutingManager;
    use crate::{MockQosRoutingListener, QosRoutingListener, RoutingConfig, RoutingError, RoutingEvent};

    struct FixedTimer(u64);

    impl Timer for FixedTimer {
        fn now_ms(&self) -> u64 {
            self.0
        }
    }

    fn link(src: u64, src_port: u32, dest: u64, dest_port: u32) -> DatapathLink {
        DatapathLink::of(NodeId::new(src), PortId::new(src_port), NodeId::new(dest), PortId::new(dest_port))
    }

    fn conn() -> FlowedConnection {
        DatapathConnection::of(NodeId::new(1), PortId::new(100), NodeId::new(2), PortId::new(200)).flowed(Flow::all())
    }

    fn line() -> TopologyGraph {
        let topology = TopologyGraph::new();
        topology.add_node(NodeId::new(1));
        topology.add_node(NodeId::new(2));
        topology.add_link(link(1, 1, 2, 1)).expect("should add");
        topology
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RoutingEvent>>,
    }

    impl QosRoutingListener for Recorder {
        fn on_routing_event(&self, event: &RoutingEvent) {
            self.events.lock().push(event.clone());
        }
    }

    struct Panicking;

    impl QosRoutingListener for Panicking {
        fn on_routing_event(&self, _event: &RoutingEvent) {
            panic!("listener failure");
        }
    }

    #[test]
    fn lifecycle_events_in_order() {
        let topology = line();
        let manager = QosRoutingManager::new(RoutingConfig::default());
        manager.attach(&topology);

        let mut listener = MockQosRoutingListener::new();
        let mut seq = Sequence::new();
        listener
            .expect_on_routing_event()
            .with(predicate::eq(RoutingEvent::ConnectionRegistered(conn())))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        listener
            .expect_on_routing_event()
            .withf(|event| matches!(event, RoutingEvent::RouteInstalled(route) if route.number_of_links() == 1))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        listener
            .expect_on_routing_event()
            .withf(|event| matches!(event, RoutingEvent::RouteRemoved { connection, .. } if *connection == conn()))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        listener
            .expect_on_routing_event()
            .withf(|event| matches!(event, RoutingEvent::ConnectionUnregistered { last_route: None, .. }))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        manager.add_listener(Arc::new(listener));

        manager.register_connection(conn()).expect("should register");
        assert!(manager.active_route(&conn()).is_some());
        topology.remove_link(&link(1, 1, 2, 1));
        assert!(manager.active_route(&conn()).is_none());
        assert_eq!(manager.unregister_connection(&conn()), Ok(None));
    }

    #[test]
    fn rejected_commands_emit_nothing() {
        let manager = QosRoutingManager::new(RoutingConfig::default());
        manager.attach(&line());
        manager.register_connection(conn()).expect("should register");

        let recorder = Arc::new(Recorder::default());
        manager.add_listener(recorder.clone());
        assert_eq!(manager.register_connection(conn()), Err(RoutingError::AlreadyRegistered(conn())));
        let other = DatapathConnection::of(NodeId::new(2), PortId::new(5), NodeId::new(1), PortId::new(5)).flowed(Flow::all());
        assert_eq!(manager.unregister_connection(&other), Err(RoutingError::NotRegistered(other.clone())));
        assert_eq!(manager.alternate_routes(&other), Err(RoutingError::NotRegistered(other.clone())));
        assert!(recorder.events.lock().is_empty());
        assert_eq!(manager.registered_connections(), vec![conn()]);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let manager = QosRoutingManager::new(RoutingConfig::default());
        manager.attach(&line());

        let recorder = Arc::new(Recorder::default());
        manager.add_listener(Arc::new(Panicking));
        manager.add_listener(recorder.clone());

        manager.register_connection(conn()).expect("should register");
        assert_eq!(recorder.events.lock().len(), 2);
        assert!(manager.active_route(&conn()).is_some());
    }

    #[test]
    fn virtual_capacity_uses_timer() {
        let manager = QosRoutingManager::with_timer(RoutingConfig::default(), Arc::new(FixedTimer(42)));
        manager.attach(&line());
        manager.register_connection(conn()).expect("should register");
        manager
            .on_link_stats_updated(FlowedLinkStats::absent(link(1, 1, 2, 1).flowed(Flow::all())).with_latency(Stat::safe(Some(Summary::single(3.0)), 7)))
            .expect("should update");

        assert_eq!(manager.update_virtual_capacity(link(1, 1, 2, 1), Some(InfoRate::from_mbps(10.0))), Ok(true));
        let route = manager.active_route(&conn()).expect("should route");
        assert_eq!(*route.data_capacity().value(), Some(InfoRate::from_mbps(10.0)));
        assert_eq!(route.data_capacity().timestamp_ms(), 42);
        assert_eq!(*route.latency().value(), Some(3.0));
    }

    #[test]
    fn route_queries() {
        let topology = line();
        topology.add_link(link(1, 2, 2, 2)).expect("should add");
        let manager = QosRoutingManager::new(RoutingConfig {
            max_alternate_routes: 1,
            ..Default::default()
        });
        manager.attach(&topology);
        manager.register_connection(conn()).expect("should register");

        assert_eq!(manager.alternate_routes(&conn()).expect("should query").len(), 1);
        assert_eq!(manager.all_routes(&conn()).expect("should query").len(), 2);
        assert_eq!(manager.all_active_routes().len(), 1);
        assert_eq!(manager.all_active_routes_for(&Flow::all()).len(), 1);
        assert_eq!(manager.all_connection_maps_for(&Flow::all()).len(), 1);
        assert!(manager.connection_map(&conn()).is_some());
        assert_eq!(manager.all_connection_maps().len(), 1);
    }

    #[test]
    fn zero_alternate_routes_is_empty() {
        let manager = QosRoutingManager::new(RoutingConfig {
            max_alternate_routes: 0,
            ..Default::default()
        });
        manager.attach(&line());
        manager.register_connection(conn()).expect("should register");

        assert_eq!(manager.alternate_routes(&conn()), Ok(vec![]));
        assert!(manager.active_route(&conn()).is_some());
    }
}
