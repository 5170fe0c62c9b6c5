#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use te_sdn_identity::{DatapathConnection, DatapathLink, Flow, FlowedConnection, NodeId, PortId};
use te_sdn_qos_routing::{QosRoutingListener, QosRoutingManager, RoutingConfig, RoutingEvent};
use te_sdn_stats::{FlowedLinkStats, Stat, Summary};
use te_sdn_topology::TopologyGraph;

pub const A: u64 = 1;
pub const B: u64 = 2;
pub const C: u64 = 3;
pub const D: u64 = 4;

/// Port used by hosts attached to a switch
pub const HOST_PORT: u32 = 100;

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<RoutingEvent>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<RoutingEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl QosRoutingListener for Recorder {
    fn on_routing_event(&self, event: &RoutingEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Switch `a` reaches `b` through its port numbered `b`, and receives on port numbered `a`
pub fn link(a: u64, b: u64) -> DatapathLink {
    DatapathLink::of(NodeId::new(a), PortId::new(b as u32), NodeId::new(b), PortId::new(a as u32))
}

pub fn connection(entry: u64, exit: u64, flow: Flow) -> FlowedConnection {
    DatapathConnection::of(NodeId::new(entry), PortId::new(HOST_PORT), NodeId::new(exit), PortId::new(HOST_PORT)).flowed(flow)
}

pub fn latency(a: u64, b: u64, flow: Flow, ms: f64, timestamp_ms: u64) -> FlowedLinkStats {
    FlowedLinkStats::absent(link(a, b).flowed(flow)).with_latency(Stat::safe(Some(Summary::single(ms)), timestamp_ms))
}

/// A topology store with an attached routing manager recording every event
pub struct Fabric {
    pub topology: TopologyGraph,
    pub manager: QosRoutingManager,
    pub recorder: Arc<Recorder>,
}

impl Fabric {
    pub fn new(nodes: &[u64], bidi_links: &[(u64, u64)]) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let topology = TopologyGraph::new();
        for node in nodes {
            topology.add_node(NodeId::new(*node));
        }
        for (a, b) in bidi_links {
            topology.add_link(link(*a, *b)).expect("should add link");
            topology.add_link(link(*b, *a)).expect("should add link");
        }
        let manager = QosRoutingManager::new(RoutingConfig::default());
        manager.attach(&topology);
        let recorder = Arc::new(Recorder::default());
        manager.add_listener(recorder.clone());
        Self { topology, manager, recorder }
    }

    pub fn events(&self) -> Vec<RoutingEvent> {
        self.recorder.take()
    }
}
