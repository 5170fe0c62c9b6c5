use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use te_sdn_identity::{BidiNodePorts, DatapathLink, NodeId, PortId};

use crate::{AdminOverlay, DatapathTopology, DiscoveryEvent, TopologyError, TopologyEvent, TopologyListener, TopologySnapshot};

#[derive(Default)]
struct TopologyState {
    version: u64,
    graph: DatapathTopology,
    overlay: AdminOverlay,
}

impl TopologyState {
    fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot::new(self.version, self.graph.clone(), self.overlay.disabled_links().clone())
    }
}

/// Shared handle over the topology store and the admin overlay.
///
/// Graph and overlay live under one lock so a snapshot is always consistent. Applied changes are
/// delivered to listeners synchronously, in registration order, after the state lock is released.
/// Listeners may read snapshots but must not mutate the topology from inside a callback.
#[derive(Clone, Default)]
pub struct TopologyGraph {
    state: Arc<Mutex<TopologyState>>,
    listeners: Arc<Mutex<Vec<Arc<dyn TopologyListener>>>>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn TopologyListener>) {
        self.listeners.lock().push(listener);
    }

    /// Adds a listener and returns the snapshot it starts from, no change can slip in between
    pub fn subscribe(&self, listener: Arc<dyn TopologyListener>) -> TopologySnapshot {
        let mut listeners = self.listeners.lock();
        listeners.push(listener);
        self.state.lock().snapshot()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        self.state.lock().snapshot()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.state.lock().graph.contains_node(node)
    }

    pub fn contains_link(&self, link: &DatapathLink) -> bool {
        self.state.lock().graph.contains_link(link)
    }

    pub fn add_node(&self, node: NodeId) -> bool {
        let events = self.apply(|state| {
            if state.graph.add_node(node) {
                log::info!("[Topology] added node {}", node);
                Ok(vec![TopologyEvent::NodeAdded(node)])
            } else {
                Ok(vec![])
            }
        });
        matches!(events, Ok(events) if !events.is_empty())
    }

    /// Removes a node and its incident links, returning those links or None if the node was unknown.
    ///
    /// Listeners receive one LinkRemoved per incident link before the NodeRemoved event.
    pub fn remove_node(&self, node: NodeId) -> Option<Vec<DatapathLink>> {
        let mut removed = None;
        let res = self.apply(|state| match state.graph.remove_node(node) {
            Some(links) => {
                log::info!("[Topology] removed node {} with {} incident links", node, links.len());
                let mut events: Vec<TopologyEvent> = links.iter().map(|l| TopologyEvent::LinkRemoved(*l)).collect();
                events.push(TopologyEvent::NodeRemoved(node));
                removed = Some(links);
                Ok(events)
            }
            None => Ok(vec![]),
        });
        match res {
            Ok(_) => removed,
            Err(e) => {
                log::error!("[Topology] removing node {} failed: {}", node, e);
                None
            }
        }
    }

    pub fn add_link(&self, link: DatapathLink) -> Result<bool, TopologyError> {
        let events = self.apply(|state| {
            if state.graph.add_link(link)? {
                log::info!("[Topology] added link {}", link);
                Ok(vec![TopologyEvent::LinkAdded(link)])
            } else {
                Ok(vec![])
            }
        })?;
        Ok(!events.is_empty())
    }

    pub fn remove_link(&self, link: &DatapathLink) -> bool {
        let events = self.apply(|state| {
            if state.graph.remove_link(link) {
                log::info!("[Topology] removed link {}", link);
                Ok(vec![TopologyEvent::LinkRemoved(*link)])
            } else {
                Ok(vec![])
            }
        });
        matches!(events, Ok(events) if !events.is_empty())
    }

    pub fn disable_link(&self, link: BidiNodePorts) -> bool {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.overlay.disable_link(link);
            if changed {
                state.version += 1;
            }
            changed
        };
        if changed {
            log::info!("[Topology] disabled link {}", link);
        }
        changed
    }

    pub fn enable_link(&self, link: BidiNodePorts) -> Result<bool, TopologyError> {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.overlay.enable_link(link)?;
            if changed {
                state.version += 1;
            }
            changed
        };
        if changed {
            log::info!("[Topology] enabled link {}", link);
        }
        Ok(changed)
    }

    pub fn suppress_link_discovery(&self, port: PortId) -> bool {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.overlay.suppress_link_discovery(port);
            if changed {
                state.version += 1;
            }
            changed
        };
        if changed {
            log::info!("[Topology] suppressed link discovery on port {}", port);
        }
        changed
    }

    pub fn is_link_suppressed(&self, link: &DatapathLink) -> bool {
        self.state.lock().overlay.is_link_suppressed(link)
    }

    /// Applies one discovery event, returning the topology changes it caused
    pub fn on_discovery_event(&self, event: DiscoveryEvent) -> Result<Vec<TopologyEvent>, TopologyError> {
        log::debug!("[Topology] discovery event {:?}", event);
        match event {
            DiscoveryEvent::NodeAdded(node) => self.apply(|state| Ok(if state.graph.add_node(node) { vec![TopologyEvent::NodeAdded(node)] } else { vec![] })),
            DiscoveryEvent::NodeRemoved(node) => self.apply(|state| {
                Ok(match state.graph.remove_node(node) {
                    Some(links) => links.into_iter().map(TopologyEvent::LinkRemoved).chain(std::iter::once(TopologyEvent::NodeRemoved(node))).collect(),
                    None => vec![],
                })
            }),
            DiscoveryEvent::LinkAdded(link) | DiscoveryEvent::LinkUpdated(link) => self.apply(|state| Ok(if state.graph.add_link(link)? { vec![TopologyEvent::LinkAdded(link)] } else { vec![] })),
            DiscoveryEvent::LinkRemoved(link) => self.apply(|state| Ok(if state.graph.remove_link(&link) { vec![TopologyEvent::LinkRemoved(link)] } else { vec![] })),
            DiscoveryEvent::Port(node, port, status) => self.apply(|state| Ok(if state.graph.contains_node(node) { vec![TopologyEvent::Port(node, port, status)] } else { vec![] })),
        }
    }

    /// Mutates under the state lock, then notifies listeners while still holding the listener lock so
    /// deliveries of consecutive changes never interleave.
    fn apply<F>(&self, mutate: F) -> Result<Vec<TopologyEvent>, TopologyError>
    where
        F: FnOnce(&mut TopologyState) -> Result<Vec<TopologyEvent>, TopologyError>,
    {
        let listeners = self.listeners.lock();
        let (events, snapshot) = {
            let mut state = self.state.lock();
            let before = (state.graph.node_count(), state.graph.link_count());
            let events = mutate(&mut *state)?;
            debug_assert!(state.graph.is_consistent(), "topology lost an endpoint");
            if events.is_empty() {
                return Ok(events);
            }
            log::trace!(
                "[Topology] graph changed from {} nodes, {} links to {} nodes, {} links",
                before.0,
                before.1,
                state.graph.node_count(),
                state.graph.link_count()
            );
            state.version += 1;
            let snapshot = state.snapshot();
            (events, snapshot)
        };

        for event in events.iter() {
            for listener in listeners.iter() {
                if catch_unwind(AssertUnwindSafe(|| listener.on_topology_event(event, &snapshot))).is_err() {
                    log::error!("[Topology] listener panicked while handling {:?}", event);
                }
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use te_sdn_identity::{BidiNodePorts, DatapathLink, NodeId, PortId};

    use super::TopologyGraph;
    use crate::{DiscoveryEvent, MockTopologyListener, PortStatus, TopologyError, TopologyEvent, TopologyListener, TopologySnapshot};

    fn link(src: u64, src_port: u32, dest: u64, dest_port: u32) -> DatapathLink {
        DatapathLink::of(NodeId::new(src), PortId::new(src_port), NodeId::new(dest), PortId::new(dest_port))
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(TopologyEvent, usize)>>,
    }

    impl TopologyListener for Recorder {
        fn on_topology_event(&self, event: &TopologyEvent, snapshot: &TopologySnapshot) {
            self.events.lock().push((event.clone(), snapshot.graph().link_count()));
        }
    }

    #[test]
    fn mutations_notify_listeners() {
        let topology = TopologyGraph::new();
        let recorder = Arc::new(Recorder::default());
        topology.add_listener(recorder.clone());

        assert!(topology.add_node(NodeId::new(1)));
        assert!(!topology.add_node(NodeId::new(1)));
        assert!(topology.add_node(NodeId::new(2)));
        assert_eq!(topology.add_link(link(1, 1, 2, 1)), Ok(true));
        assert_eq!(topology.add_link(link(1, 1, 2, 1)), Ok(false));
        assert_eq!(topology.add_link(link(1, 2, 3, 1)), Err(TopologyError::MissingEndpoint(link(1, 2, 3, 1))));
        assert_eq!(topology.remove_node(NodeId::new(2)), Some(vec![link(1, 1, 2, 1)]));
        assert_eq!(topology.remove_node(NodeId::new(2)), None);
        assert!(!topology.remove_link(&link(1, 1, 2, 1)));

        assert_eq!(
            *recorder.events.lock(),
            vec![
                (TopologyEvent::NodeAdded(NodeId::new(1)), 0),
                (TopologyEvent::NodeAdded(NodeId::new(2)), 0),
                (TopologyEvent::LinkAdded(link(1, 1, 2, 1)), 1),
                (TopologyEvent::LinkRemoved(link(1, 1, 2, 1)), 0),
                (TopologyEvent::NodeRemoved(NodeId::new(2)), 0),
            ]
        );
    }

    #[test]
    fn discovery_intake() {
        let topology = TopologyGraph::new();
        assert_eq!(topology.on_discovery_event(DiscoveryEvent::Port(NodeId::new(1), PortId::new(1), PortStatus::Added)), Ok(vec![]));
        topology.on_discovery_event(DiscoveryEvent::NodeAdded(NodeId::new(1))).expect("should apply");
        topology.on_discovery_event(DiscoveryEvent::NodeAdded(NodeId::new(2))).expect("should apply");
        assert_eq!(topology.on_discovery_event(DiscoveryEvent::LinkUpdated(link(1, 1, 2, 1))), Ok(vec![TopologyEvent::LinkAdded(link(1, 1, 2, 1))]));
        assert_eq!(topology.on_discovery_event(DiscoveryEvent::LinkUpdated(link(1, 1, 2, 1))), Ok(vec![]));
        assert_eq!(
            topology.on_discovery_event(DiscoveryEvent::Port(NodeId::new(1), PortId::new(1), PortStatus::Deactivated)),
            Ok(vec![TopologyEvent::Port(NodeId::new(1), PortId::new(1), PortStatus::Deactivated)])
        );
        assert_eq!(
            topology.on_discovery_event(DiscoveryEvent::NodeRemoved(NodeId::new(1))),
            Ok(vec![TopologyEvent::LinkRemoved(link(1, 1, 2, 1)), TopologyEvent::NodeRemoved(NodeId::new(1))])
        );
        assert!(!topology.contains_node(NodeId::new(1)));
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let topology = TopologyGraph::new();
        let mut panicking = MockTopologyListener::new();
        panicking.expect_on_topology_event().times(1).returning(|_, _| panic!("listener failure"));
        let recorder = Arc::new(Recorder::default());
        topology.add_listener(Arc::new(panicking));
        topology.add_listener(recorder.clone());

        assert!(topology.add_node(NodeId::new(1)));
        assert_eq!(recorder.events.lock().len(), 1);
    }

    #[test]
    fn snapshot_holds_overlay() {
        let topology = TopologyGraph::new();
        topology.add_node(NodeId::new(1));
        topology.add_node(NodeId::new(2));
        topology.add_link(link(1, 1, 2, 1)).expect("should add");
        let bidi: BidiNodePorts = link(1, 1, 2, 1).bidi();
        assert!(topology.disable_link(bidi));

        let snapshot = topology.snapshot();
        topology.remove_link(&link(1, 1, 2, 1));
        assert_eq!(topology.enable_link(bidi), Ok(true));

        assert!(snapshot.graph().contains_link(&link(1, 1, 2, 1)));
        assert!(snapshot.is_link_disabled(&link(2, 1, 1, 1)));
        assert!(topology.snapshot().disabled_links().is_empty());
        assert_eq!(snapshot.version(), 4);
        assert_eq!(topology.snapshot().version(), 6);
    }

    #[test]
    fn suppressed_port_blocks_enable() {
        let topology = TopologyGraph::new();
        let bidi = link(1, 4, 2, 1).bidi();
        topology.disable_link(bidi);
        assert!(topology.suppress_link_discovery(PortId::new(4)));
        assert_eq!(topology.enable_link(bidi), Err(TopologyError::SuppressedPort(bidi, PortId::new(4))));
        assert!(topology.is_link_suppressed(&link(3, 4, 5, 5)));
    }
}
