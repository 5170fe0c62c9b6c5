mod error;
mod event;
mod graph;
mod overlay;
mod shared;
mod snapshot;

pub use error::TopologyError;
#[cfg(any(test, feature = "mock"))]
pub use event::MockTopologyListener;
pub use event::{DiscoveryEvent, PortStatus, TopologyEvent, TopologyListener};
pub use graph::DatapathTopology;
pub use overlay::AdminOverlay;
pub use shared::TopologyGraph;
pub use snapshot::TopologySnapshot;
